//! Durable storage for the ledgers. Each ledger is an independent JSON blob stored under its own
//! key through a [KeyValueStore]; [json_store::JsonFileStore] keeps one file per key.

pub mod json_store;

use std::future::Future;

use anyhow::Result;
use serde_json::Value;

use crate::ledger::{
    normalize::{normalize_category_history, normalize_history},
    Ledgers,
};

pub const HISTORY_KEY: &str = "timetrack.history";
pub const LANGUAGE_HISTORY_KEY: &str = "timetrack.languageHistory";
pub const FRAMEWORK_HISTORY_KEY: &str = "timetrack.frameworkHistory";

/// Interface for abstracting the durable key/value storage.
pub trait KeyValueStore {
    /// Returns [None] when nothing usable is stored under `key`.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Value>>>;

    fn save(&self, key: &str, value: Value) -> impl Future<Output = Result<()>>;
}

/// Loads all three ledgers, upgrading older shapes on the way.
pub async fn load_ledgers(store: &impl KeyValueStore) -> Result<Ledgers> {
    let history = normalize_history(store.load(HISTORY_KEY).await?);
    let language_history = normalize_category_history(store.load(LANGUAGE_HISTORY_KEY).await?);
    let framework_history = normalize_category_history(store.load(FRAMEWORK_HISTORY_KEY).await?);
    Ok(Ledgers::new(history, language_history, framework_history))
}

pub async fn save_ledgers(store: &impl KeyValueStore, ledgers: &Ledgers) -> Result<()> {
    store
        .save(HISTORY_KEY, serde_json::to_value(&ledgers.history)?)
        .await?;
    store
        .save(
            LANGUAGE_HISTORY_KEY,
            serde_json::to_value(&ledgers.language_history)?,
        )
        .await?;
    store
        .save(
            FRAMEWORK_HISTORY_KEY,
            serde_json::to_value(&ledgers.framework_history)?,
        )
        .await?;
    Ok(())
}
