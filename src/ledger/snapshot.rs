//! Read-only projections of the ledger for the presentation layer.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::time::{format_duration, parse_date_key};

use super::{CategoryHistory, History, LEGACY_PROJECT_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub project: String,
    pub date: String,
    pub ms: f64,
}

/// Everything the dashboard needs to render. Field names follow the host's JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub rows: Vec<HistoryRow>,
    pub language_history: CategoryHistory,
    pub framework_history: CategoryHistory,
}

/// Flattens the primary ledger into rows, with the live working total standing in for
/// `(current_project, today_key)`. Rows are sorted by project, then date, both descending.
pub fn build_rows(
    history: &History,
    today_key: &str,
    today_ms: f64,
    current_project: Option<&str>,
) -> Vec<HistoryRow> {
    let mut rows_by_key = BTreeMap::<(String, String), f64>::new();
    for (project, days) in history {
        for (date, ms) in days {
            rows_by_key.insert((project.clone(), date.clone()), *ms);
        }
    }

    match current_project {
        Some(project) => {
            rows_by_key.insert((project.to_owned(), today_key.to_owned()), today_ms);
        }
        None if rows_by_key.is_empty() && today_ms > 0. => {
            rows_by_key.insert((LEGACY_PROJECT_KEY.to_owned(), today_key.to_owned()), today_ms);
        }
        None => {}
    }

    // BTreeMap iterates ascending by (project, date), so reversing gives the display order.
    rows_by_key
        .into_iter()
        .rev()
        .map(|((project, date), ms)| HistoryRow { project, date, ms })
        .collect()
}

/// Inclusive range of UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending with `end`, `end` included.
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        let start = end - chrono::Duration::days(i64::from(days.max(1)) - 1);
        Self { start, end }
    }

    pub fn contains_key(&self, date_key: &str) -> bool {
        parse_date_key(date_key).is_some_and(|date| self.start <= date && date <= self.end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub today: f64,
    pub range: f64,
    pub month: f64,
    pub all: f64,
}

/// Totals shown on top of the dashboard: today, the selected range, the current month and
/// everything recorded.
pub fn summarize(rows: &[HistoryRow], today: NaiveDate, range: DayRange) -> Summary {
    let month_start = today.with_day(1).unwrap_or(today);
    rows.iter().fold(Summary::default(), |mut acc, row| {
        acc.all += row.ms;
        if let Some(date) = parse_date_key(&row.date) {
            if date == today {
                acc.today += row.ms;
            }
            if range.start <= date && date <= range.end {
                acc.range += row.ms;
            }
            if date >= month_start {
                acc.month += row.ms;
            }
        }
        acc
    })
}

/// Sums a category ledger over all projects for the days in `range`. Largest first.
pub fn category_totals(history: &CategoryHistory, range: DayRange) -> Vec<(String, f64)> {
    let mut totals = HashMap::<&str, f64>::new();
    for days in history.values() {
        for (date, labels) in days {
            if !range.contains_key(date) {
                continue;
            }
            for (label, ms) in labels {
                *totals.entry(label.as_str()).or_insert(0.) += ms;
            }
        }
    }
    let mut totals = totals
        .into_iter()
        .map(|(label, ms)| (label.to_owned(), ms))
        .collect::<Vec<_>>();
    totals.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals
}

/// Live status shown by the host. Derived from the working total on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusLine {
    pub text: String,
    pub active: bool,
    pub today_ms: f64,
}

impl StatusLine {
    pub fn new(today_ms: f64, active: bool) -> Self {
        let indicator = if active { '●' } else { '○' };
        Self {
            text: format!("{} {indicator}", format_duration(today_ms)),
            active,
            today_ms,
        }
    }

    /// Two statuses that render the same text are not worth another message to the host.
    pub fn renders_like(&self, other: &StatusLine) -> bool {
        self.text == other.text && self.active == other.active
    }
}
