//! The time ledger. Every ledger is keyed first by project and then by `YYYY-MM-DD` date key:
//!  - [History] holds total active milliseconds per project and day.
//!  - [CategoryHistory] holds the same split by a category label (language or framework).
//!
//! Lookups of missing keys mean zero time. None of the operations here can fail.

pub mod normalize;
pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Project key used for data recorded before projects were tracked.
pub const LEGACY_PROJECT_KEY: &str = "Legacy";

/// Category label used when a project has no detected frameworks.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

pub type ProjectMap<V> = BTreeMap<String, BTreeMap<String, V>>;

/// project -> date -> milliseconds
pub type History = ProjectMap<f64>;

/// project -> date -> label -> milliseconds
pub type CategoryHistory = ProjectMap<BTreeMap<String, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Language,
    Framework,
}

/// All three ledgers. They are populated independently but always mutated together by the
/// tracker, so they live and get persisted as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledgers {
    pub history: History,
    pub language_history: CategoryHistory,
    pub framework_history: CategoryHistory,
}

impl Ledgers {
    pub fn new(
        history: History,
        language_history: CategoryHistory,
        framework_history: CategoryHistory,
    ) -> Self {
        Self {
            history,
            language_history,
            framework_history,
        }
    }

    pub fn day_total(&self, project: &str, date: &str) -> f64 {
        self.history
            .get(project)
            .and_then(|days| days.get(date))
            .copied()
            .unwrap_or(0.)
    }

    pub fn set_day_total(&mut self, project: &str, date: &str, ms: f64) {
        self.history
            .entry(project.to_owned())
            .or_default()
            .insert(date.to_owned(), ms);
    }

    pub fn category(&self, category: Category) -> &CategoryHistory {
        match category {
            Category::Language => &self.language_history,
            Category::Framework => &self.framework_history,
        }
    }

    pub fn category_ms(&self, category: Category, project: &str, date: &str, label: &str) -> f64 {
        self.category(category)
            .get(project)
            .and_then(|days| days.get(date))
            .and_then(|labels| labels.get(label))
            .copied()
            .unwrap_or(0.)
    }

    pub fn add_category_ms(
        &mut self,
        category: Category,
        project: &str,
        date: &str,
        label: &str,
        delta: f64,
    ) {
        let history = match category {
            Category::Language => &mut self.language_history,
            Category::Framework => &mut self.framework_history,
        };
        *history
            .entry(project.to_owned())
            .or_default()
            .entry(date.to_owned())
            .or_default()
            .entry(label.to_owned())
            .or_insert(0.) += delta;
    }

    /// Removes `(project, date)` from all three ledgers. Returns whether anything was removed.
    pub fn delete_entry(&mut self, project: &str, date: &str) -> bool {
        let removed = [
            remove_entry(&mut self.history, project, date),
            remove_entry(&mut self.language_history, project, date),
            remove_entry(&mut self.framework_history, project, date),
        ];
        let removed = removed.into_iter().any(|v| v);
        if !removed {
            debug!("Nothing recorded for {project} on {date}");
        }
        removed
    }

    pub fn reset_all(&mut self) {
        self.history.clear();
        self.language_history.clear();
        self.framework_history.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.language_history.is_empty() && self.framework_history.is_empty()
    }
}

/// Removes a single date from one ledger and drops the project once it has no dates left.
pub fn remove_entry<V>(ledger: &mut ProjectMap<V>, project: &str, date: &str) -> bool {
    let Some(days) = ledger.get_mut(project) else {
        return false;
    };
    let removed = days.remove(date).is_some();
    if days.is_empty() {
        ledger.remove(project);
    }
    removed
}
