use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::signals::WorkspaceFolder;

/// Language recorded before the host told us anything about the active document.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Decides whether the user is active and what they are working on. Only cheap fields live
/// here; everything is updated from activity signals.
#[derive(Debug)]
pub struct ActivityTracker {
    last_activity_at: DateTime<Utc>,
    folders: Vec<WorkspaceFolder>,
    active_document: Option<PathBuf>,
    current_project: Option<String>,
    current_language: String,
}

impl ActivityTracker {
    pub fn new(now: DateTime<Utc>, folders: Vec<WorkspaceFolder>) -> Self {
        let mut tracker = Self {
            last_activity_at: now,
            folders,
            active_document: None,
            current_project: None,
            current_language: UNKNOWN_LANGUAGE.to_owned(),
        };
        tracker.current_project = tracker.resolve_project(None);
        tracker
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    /// Active iff a workspace is open and the last activity is at most `threshold_ms` old.
    /// Activity without a workspace can't be attributed to anything, so it never counts.
    pub fn is_active(&self, now: DateTime<Utc>, threshold_ms: i64) -> bool {
        self.is_workspace_open() && (now - self.last_activity_at).num_milliseconds() <= threshold_ms
    }

    pub fn is_workspace_open(&self) -> bool {
        !self.folders.is_empty()
    }

    pub fn current_project(&self) -> Option<&str> {
        self.current_project.as_deref()
    }

    pub fn current_language(&self) -> &str {
        &self.current_language
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    /// Replaces the project and language after the active document or editor changed. `document`
    /// is the document the signal came from, falling back to the last known active document.
    pub fn update_context(&mut self, document: Option<PathBuf>, language: Option<String>) {
        if let Some(document) = document {
            self.active_document = Some(document);
        }
        if let Some(language) = language {
            self.current_language = language;
        }
        self.current_project = self.resolve_project(self.active_document.as_deref());
    }

    pub fn update_folders(&mut self, folders: Vec<WorkspaceFolder>) {
        self.folders = folders;
        self.current_project = self.resolve_project(self.active_document.as_deref());
    }

    /// Prefers the most specific folder containing `document`, then the first folder. Yields
    /// [None] only when no folder is open.
    fn resolve_project(&self, document: Option<&Path>) -> Option<String> {
        let containing = document.and_then(|document| {
            self.folders
                .iter()
                .filter(|folder| document.starts_with(&folder.path))
                .max_by_key(|folder| folder.path.components().count())
        });
        containing
            .or_else(|| self.folders.first())
            .map(|folder| folder.name.clone())
    }
}
