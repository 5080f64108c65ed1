//! JSON file persistence shared by the game stores.
//!
//! Each store keeps its rows in memory and mirrors them to one JSON file under the
//! data directory. A missing or unreadable file never prevents the bot from
//! starting: the store begins empty instead. An unreadable file is moved to
//! `<path>.corrupt` first so its content can still be recovered by hand.
//!
//! Writes go to `<path>.tmp` and are renamed over the file, so the file on disk is
//! always a complete document. Stores call [`JsonFile::persist`] while holding the
//! lock of their rows, the last write is then always the latest state.

use log::{debug, error, info, warn};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, sync::Mutex};

use crate::games::GameError;

/// A JSON document on disk.
#[derive(Debug)]
pub struct JsonFile {
    /// Path of the file
    path: String,
    /// Held while the temporary file is written and renamed
    write_lock: Mutex<()>,
}

impl JsonFile {
    pub fn new(path: String) -> Self {
        JsonFile {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Reads and deserializes the file.
    ///
    /// # Returns
    ///
    /// The stored value, or `T::default()` when the file is missing (warning) or
    /// cannot be deserialized (error).
    pub async fn load<T: DeserializeOwned + Default>(&self) -> T {
        let Ok(serialized) = fs::read_to_string(&self.path).await else {
            warn!("no persisted data found at {}, starting empty", self.path);
            return T::default();
        };
        if serialized.trim().is_empty() {
            warn!("persisted data at {} is empty, starting empty", self.path);
            return T::default();
        }

        match serde_json::from_str(&serialized) {
            Ok(value) => {
                info!("loaded persisted data from {}", self.path);
                value
            }
            Err(e) => {
                let corrupt_path = format!("{}.corrupt", self.path);
                error!(
                    "failed to deserialize data from {}, moving it to {} and starting empty: {}",
                    self.path, corrupt_path, e
                );
                if let Err(e) = fs::rename(&self.path, &corrupt_path).await {
                    error!("failed to move {} aside: {}", self.path, e);
                }
                T::default()
            }
        }
    }

    /// Serializes `value` and replaces the file with it.
    ///
    /// # Errors
    ///
    /// [`GameError::Persistence`] when serialization or the write fails. The
    /// previous file is left untouched in that case.
    pub async fn persist<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), GameError> {
        let serialized = serde_json::to_string(value).map_err(|e| self.persistence_error(e))?;
        let tmp_path = format!("{}.tmp", self.path);

        let _guard = self.write_lock.lock().await;
        fs::write(&tmp_path, serialized)
            .await
            .map_err(|e| self.persistence_error(e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.persistence_error(e))?;

        debug!("persisted {}", self.path);
        Ok(())
    }

    fn persistence_error(&self, reason: impl ToString) -> GameError {
        GameError::Persistence {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
