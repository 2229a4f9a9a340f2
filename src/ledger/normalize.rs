//! Upgrades persisted ledgers into the current shape. Older versions stored the primary history
//! as a flat `date -> ms` map, without projects. Such data is nested under
//! [LEGACY_PROJECT_KEY](super::LEGACY_PROJECT_KEY) on load and only ever written back nested.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::{CategoryHistory, History, LEGACY_PROJECT_KEY};

/// The shapes the primary history can be found in.
#[derive(Debug, PartialEq)]
pub enum StoredHistory {
    Nested(History),
    Legacy(BTreeMap<String, f64>),
}

impl StoredHistory {
    /// The first value of the top-level map decides the shape: a map means the current shape,
    /// anything else means the legacy flat shape.
    pub fn decode(raw: Value) -> Option<Self> {
        let root = match raw {
            Value::Object(root) => root,
            other => {
                warn!("Ignoring stored history that isn't a map: {other}");
                return None;
            }
        };
        match root.values().next() {
            Some(Value::Object(_)) => Some(Self::Nested(decode_nested(root, decode_ms_map))),
            Some(_) => Some(Self::Legacy(decode_ms_map(root))),
            None => Some(Self::Nested(History::new())),
        }
    }

    pub fn into_history(self) -> History {
        match self {
            StoredHistory::Nested(history) => history,
            StoredHistory::Legacy(days) if days.is_empty() => History::new(),
            StoredHistory::Legacy(days) => History::from([(LEGACY_PROJECT_KEY.to_owned(), days)]),
        }
    }
}

/// Turns whatever was persisted under the primary history key into the current shape.
pub fn normalize_history(raw: Option<Value>) -> History {
    raw.and_then(StoredHistory::decode)
        .map(StoredHistory::into_history)
        .unwrap_or_default()
}

/// Category ledgers never had a legacy shape. Anything unexpected is dropped.
pub fn normalize_category_history(raw: Option<Value>) -> CategoryHistory {
    match raw {
        Some(Value::Object(root)) => decode_nested(root, |days| decode_nested(days, decode_ms_map)),
        Some(other) => {
            warn!("Ignoring stored category history that isn't a map: {other}");
            CategoryHistory::new()
        }
        None => CategoryHistory::new(),
    }
}

fn decode_nested<V>(
    root: Map<String, Value>,
    decode_inner: impl Fn(Map<String, Value>) -> V,
) -> BTreeMap<String, V> {
    root.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Object(inner) => Some((key, decode_inner(inner))),
            other => {
                warn!("Skipping malformed ledger entry {key}: {other}");
                None
            }
        })
        .collect()
}

fn decode_ms_map(root: Map<String, Value>) -> BTreeMap<String, f64> {
    root.into_iter()
        .filter_map(|(key, value)| match value.as_f64() {
            Some(ms) => Some((key, ms)),
            None => {
                warn!("Skipping non numeric ledger value {key}: {value}");
                None
            }
        })
        .collect()
}
