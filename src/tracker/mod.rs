//! The running tracker. Four cooperative tasks share one thread:
//!  - [signals::SignalReader] turns host input into [signals::InboundMessage]s.
//!  - [accumulation::AccumulationLoop] owns the [session::TrackerSession] and ticks it.
//!  - [persist::PersistModule] writes ledger snapshots to disk.
//!  - [signals::write_outbound] sends status and stats back to the host.

use std::path::PathBuf;

use anyhow::Result;
use tokio::{io::BufReader, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    classify::{ConfiguredClassifier, ProjectClassifier},
    config::Config,
    ledger::Ledgers,
    storage::{json_store::JsonFileStore, load_ledgers},
    utils::clock::{Clock, SystemClock},
};

use accumulation::AccumulationLoop;
use persist::PersistModule;
use session::TrackerSession;
use signals::{write_outbound, InboundMessage, OutboundMessage, SignalReader, WorkspaceFolder};

pub mod accumulation;
pub mod activity;
pub mod persist;
pub mod session;
pub mod shutdown;
pub mod signals;

pub const LEDGER_DIR: &str = "ledger";

const INBOUND_CAPACITY: usize = 64;
const OUTBOUND_CAPACITY: usize = 64;
const PERSIST_CAPACITY: usize = 4;

/// Represents the starting point for `serve`. Returns once the host closed stdin or Ctrl-C was
/// received, after the final flush has been written.
pub async fn start_tracker(
    dir: PathBuf,
    config: Config,
    folders: Vec<WorkspaceFolder>,
) -> Result<()> {
    let store = JsonFileStore::new(dir.join(LEDGER_DIR))?;
    let ledgers = load_ledgers(&store).await?;
    info!(
        "Loaded ledgers for {} projects from {dir:?}",
        ledgers.history.len()
    );

    let shutdown_token = CancellationToken::new();
    let (inbound_sender, inbound_receiver) = mpsc::channel::<InboundMessage>(INBOUND_CAPACITY);
    let (persist_sender, persist_receiver) = mpsc::channel::<Ledgers>(PERSIST_CAPACITY);
    let (outbound_sender, outbound_receiver) =
        mpsc::channel::<OutboundMessage>(OUTBOUND_CAPACITY);

    let reader = SignalReader::new(
        BufReader::new(tokio::io::stdin()),
        inbound_sender,
        shutdown_token.clone(),
    );
    let classifier = ConfiguredClassifier::new(config.frameworks.clone());
    let accumulation = create_accumulation_loop(
        ledgers,
        classifier,
        &config,
        folders,
        Channels {
            inbound: inbound_receiver,
            persist: persist_sender,
            outbound: outbound_sender,
        },
        &shutdown_token,
        SystemClock,
    );
    let persister = PersistModule::new(persist_receiver, store);

    let (_, reading_result, accumulation_result, persist_result, output_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        reader.run(),
        accumulation.run(),
        persister.run(),
        write_outbound(outbound_receiver, tokio::io::stdout()),
    );

    if let Err(e) = reading_result {
        error!("Reading host input got an error {e:?}");
    }

    if let Err(e) = output_result {
        error!("Writing host output got an error {e:?}");
    }

    accumulation_result?;
    persist_result?;
    Ok(())
}

struct Channels {
    inbound: mpsc::Receiver<InboundMessage>,
    persist: mpsc::Sender<Ledgers>,
    outbound: mpsc::Sender<OutboundMessage>,
}

fn create_accumulation_loop(
    ledgers: Ledgers,
    classifier: impl ProjectClassifier + 'static,
    config: &Config,
    folders: Vec<WorkspaceFolder>,
    channels: Channels,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> AccumulationLoop {
    let session = TrackerSession::new(
        ledgers,
        Box::new(classifier),
        config.tracker,
        folders,
        clock.time(),
    );
    AccumulationLoop::new(
        session,
        channels.inbound,
        channels.persist,
        channels.outbound,
        shutdown_token.clone(),
        config.tracker.tick_interval(),
        Box::new(clock),
    )
}
