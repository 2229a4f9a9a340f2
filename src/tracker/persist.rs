use anyhow::Result;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use crate::{
    ledger::Ledgers,
    storage::{save_ledgers, KeyValueStore},
};

/// Writes ledger snapshots handed over by the accumulation loop. Failed writes are logged and
/// not retried. Runs until every sender is dropped, which writes the final shutdown snapshot
/// before it returns.
pub struct PersistModule<S> {
    receiver: Receiver<Ledgers>,
    store: S,
}

impl<S: KeyValueStore> PersistModule<S> {
    pub fn new(receiver: Receiver<Ledgers>, store: S) -> Self {
        Self { receiver, store }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(ledgers) = self.receiver.recv().await {
            debug!("Persisting {} projects", ledgers.history.len());
            match save_ledgers(&self.store, &ledgers).await {
                Ok(_) => debug!("Persisted ledgers"),
                Err(e) => error!("Failed to persist ledgers {e:?}"),
            }
        }

        self.receiver.close();
        info!("Persistence finished");
        Ok(())
    }
}
