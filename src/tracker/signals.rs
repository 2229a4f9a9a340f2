//! Messages exchanged with the host editor. Inbound messages arrive as JSON lines on stdin,
//! outbound messages leave as JSON lines on stdout.

use std::path::PathBuf;

use anyhow::Result;
use futures::StreamExt;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::ledger::snapshot::{StatsSnapshot, StatusLine};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub name: String,
    #[serde(deserialize_with = "deserialize_location")]
    pub path: PathBuf,
}

impl WorkspaceFolder {
    /// Folder named after the last component of `path`.
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { name, path }
    }
}

/// Hosts identify documents and folders by URI. `file://` URIs are turned into paths, anything
/// else is taken as a path already.
pub fn location_to_path(location: &str) -> PathBuf {
    Url::parse(location)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(location))
}

fn deserialize_location<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    String::deserialize(deserializer).map(|v| location_to_path(&v))
}

fn deserialize_optional_location<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PathBuf>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|v| v.map(|v| location_to_path(&v)))
}

/// Things the user did in the host. Every variant counts as activity, except a folder change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivitySignal {
    DocumentChanged {
        #[serde(default, deserialize_with = "deserialize_optional_location")]
        uri: Option<PathBuf>,
        #[serde(default)]
        language: Option<String>,
    },
    SelectionChanged,
    EditorFocusChanged {
        #[serde(default, deserialize_with = "deserialize_optional_location")]
        uri: Option<PathBuf>,
        #[serde(default)]
        language: Option<String>,
    },
    WindowFocusGained,
    TerminalActivated,
    WorkspaceFoldersChanged {
        folders: Vec<WorkspaceFolder>,
    },
}

/// Requests coming from the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRequest {
    DeleteHistory { project: String, date: String },
    ResetAll,
    RequestStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Activity(ActivitySignal),
    Request(HostRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Status(StatusLine),
    StatsData { payload: StatsSnapshot },
}

/// Reads inbound messages line by line and forwards them to the accumulation loop. The end of
/// the input means the host went away, which shuts the tracker down.
pub struct SignalReader<R> {
    input: R,
    next: mpsc::Sender<InboundMessage>,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> SignalReader<R> {
    pub fn new(input: R, next: mpsc::Sender<InboundMessage>, shutdown: CancellationToken) -> Self {
        Self {
            input,
            next,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut lines = LinesStream::new(tokio::io::AsyncBufReadExt::lines(self.input));
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next() => line,
            };
            match line {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => match serde_json::from_str::<InboundMessage>(&line) {
                    Ok(message) => {
                        debug!("Received {message:?}");
                        if self.next.send(message).await.is_err() {
                            warn!("Accumulation loop stopped, no longer reading input");
                            return Ok(());
                        }
                    }
                    Err(e) => warn!("Skipping malformed message {line:?}: {e}"),
                },
                Some(Err(e)) => {
                    error!("Failed to read input {e:?}");
                    self.shutdown.cancel();
                    return Err(e.into());
                }
                None => {
                    info!("Input closed, shutting down");
                    self.shutdown.cancel();
                    return Ok(());
                }
            }
        }
    }
}

/// Writes outbound messages as JSON lines until every sender is gone.
pub async fn write_outbound(
    mut receiver: mpsc::Receiver<OutboundMessage>,
    mut output: impl AsyncWrite + Unpin,
) -> Result<()> {
    while let Some(message) = receiver.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}
