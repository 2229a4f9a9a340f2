use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::KeyValueStore;

/// The main realization of [KeyValueStore]. Every key is a `<key>.json` file inside `dir`.
/// Readers take a shared lock and writers an exclusive one, so the offline CLI commands can
/// touch the files while a tracker is running.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read_locked(path: &Path) -> std::result::Result<String, std::io::Error> {
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        read.map(|_| content)
    }

    async fn write_locked(path: &Path, content: &[u8]) -> std::result::Result<(), std::io::Error> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        file.lock_exclusive()?;
        let written = async {
            file.set_len(0).await?;
            file.rewind().await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;
        file.unlock_async().await?;
        written
    }
}

impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        debug!("Loading {path:?}");
        let content = match Self::read_locked(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {path:?}")),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // Might happen when a write got cut off. The next save replaces the file.
                warn!("Stored value in {path:?} is not valid json: {e}");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        let content = serde_json::to_vec(&value)?;
        Self::write_locked(&path, &content)
            .await
            .with_context(|| format!("Failed to write {path:?}"))?;
        debug!("Saved {path:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::{
        ledger::{Category, Ledgers},
        storage::{load_ledgers, save_ledgers, KeyValueStore, HISTORY_KEY},
    };

    use super::JsonFileStore;

    #[tokio::test]
    async fn missing_key_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;
        assert_eq!(store.load("absent").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn saved_value_is_loaded_back() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;
        store
            .save("key", json!({ "demo": { "2026-01-01": 1000.0 } }))
            .await?;
        store.save("key", json!({})).await?;
        assert_eq!(store.load("key").await?, Some(json!({})));
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_file_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("key.json"), "{\"demo\": {\"2026-01")?;
        let store = JsonFileStore::new(dir.path().to_owned())?;
        assert_eq!(store.load("key").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn legacy_history_file_is_normalized_on_load() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;
        store
            .save(HISTORY_KEY, json!({ "2026-01-01": 600000 }))
            .await?;

        let ledgers = load_ledgers(&store).await?;

        assert_eq!(ledgers.day_total("Legacy", "2026-01-01"), 600000.);
        assert!(ledgers.language_history.is_empty());

        save_ledgers(&store, &ledgers).await?;
        assert_eq!(
            store.load(HISTORY_KEY).await?,
            Some(json!({ "Legacy": { "2026-01-01": 600000.0 } }))
        );
        Ok(())
    }

    #[tokio::test]
    async fn ledgers_survive_a_save() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;
        let mut ledgers = Ledgers::default();
        ledgers.set_day_total("demo", "2026-01-01", 3000.);
        ledgers.add_category_ms(Category::Language, "demo", "2026-01-01", "Python", 3000.);
        ledgers.add_category_ms(Category::Framework, "demo", "2026-01-01", "Django", 3000.);

        save_ledgers(&store, &ledgers).await?;

        assert_eq!(load_ledgers(&store).await?, ledgers);
        Ok(())
    }
}
