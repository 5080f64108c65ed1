//! On-disk Matrix session of the bot.
//!
//! The session directory holds:
//! - `session`: JSON file with the login session and the last sync token
//! - `sqlite`: SQLite state store of the Matrix SDK

use log::{debug, trace, warn};
use matrix_sdk::authentication::matrix::MatrixSession;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::utils::get_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedSession {
    user_session: MatrixSession,

    /// Omitted until the first sync completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// Session files of the bot, loaded once at startup.
#[derive(Clone)]
pub struct SessionStore {
    /// Session found on disk at startup, if any
    saved: Option<SavedSession>,
    /// `dir_path/sqlite`
    sqlite_path: String,
    /// `dir_path/session`
    session_path: String,
}

impl SessionStore {
    /// Opens the session directory `dir_path`.
    ///
    /// A missing session file means the bot never logged in. A corrupt one is
    /// ignored with a warning and the bot logs in again.
    pub async fn open(dir_path: &str) -> Self {
        let sqlite_path = get_path(dir_path, "sqlite");
        let session_path = get_path(dir_path, "session");
        debug!("session at {}, state store at {}", session_path, sqlite_path);

        let saved = match read_saved(&session_path).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                if fs::try_exists(&session_path).await.unwrap_or_default() {
                    warn!("ignoring unreadable session {}: {}", session_path, e);
                } else {
                    debug!("no session at {}", session_path);
                }
                None
            }
        };

        SessionStore {
            saved,
            sqlite_path,
            session_path,
        }
    }

    pub fn has_session(&self) -> bool {
        self.saved.is_some()
    }

    pub fn sqlite_path(&self) -> &str {
        &self.sqlite_path
    }

    pub fn user_session(&self) -> Option<&MatrixSession> {
        self.saved.as_ref().map(|s| &s.user_session)
    }

    /// Sync token to resume from, as found at startup.
    pub fn sync_token(&self) -> Option<String> {
        self.saved.as_ref().and_then(|s| s.sync_token.clone())
    }

    /// Writes `sync_token` next to the persisted login session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file can't be read, parsed or written.
    pub async fn persist_sync_token(&self, sync_token: String) -> anyhow::Result<()> {
        trace!("persist sync token {}", sync_token);

        let mut saved = read_saved(&self.session_path).await?;
        saved.sync_token = Some(sync_token);
        fs::write(&self.session_path, serde_json::to_string(&saved)?).await?;

        Ok(())
    }

    /// Writes a new login session, dropping any previous sync token.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file can't be written.
    pub async fn persist_user_session(&self, user_session: &MatrixSession) -> anyhow::Result<()> {
        trace!("persist user session");

        let saved = SavedSession {
            user_session: user_session.clone(),
            sync_token: None,
        };
        fs::write(&self.session_path, serde_json::to_string(&saved)?).await?;

        Ok(())
    }
}

async fn read_saved(session_path: &str) -> anyhow::Result<SavedSession> {
    let data = fs::read_to_string(session_path).await?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use matrix_sdk::{SessionMeta, SessionTokens};
    use tempfile::TempDir;

    use super::*;

    fn create_user_session() -> MatrixSession {
        MatrixSession {
            meta: SessionMeta {
                user_id: "@boti:example.com".try_into().unwrap(),
                device_id: "DEVICEID".into(),
            },
            tokens: SessionTokens {
                access_token: "access_token".to_string(),
                refresh_token: None,
            },
        }
    }

    fn dir_path(dir: &TempDir) -> String {
        dir.path().to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_open_without_session() {
        let dir = TempDir::new().unwrap();

        let store = SessionStore::open(&dir_path(&dir)).await;

        assert!(!store.has_session());
        assert!(store.user_session().is_none());
        assert!(store.sync_token().is_none());
        assert_eq!(store.sqlite_path(), get_path(&dir_path(&dir), "sqlite"));
    }

    #[tokio::test]
    async fn test_open_with_corrupt_session() {
        let dir = TempDir::new().unwrap();
        fs::write(get_path(&dir_path(&dir), "session"), "not json")
            .await
            .unwrap();

        let store = SessionStore::open(&dir_path(&dir)).await;

        assert!(!store.has_session());
    }

    #[tokio::test]
    async fn test_persist_then_reopen() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(&dir_path(&dir)).await;

        store
            .persist_user_session(&create_user_session())
            .await
            .unwrap();
        store
            .persist_sync_token("s72594_4483_1934".to_string())
            .await
            .unwrap();

        let reopened = SessionStore::open(&dir_path(&dir)).await;
        assert!(reopened.has_session());
        assert_eq!(
            reopened.user_session().unwrap().meta.user_id.to_string(),
            "@boti:example.com"
        );
        assert_eq!(reopened.sync_token(), Some("s72594_4483_1934".to_string()));
    }

    #[tokio::test]
    async fn test_new_login_drops_sync_token() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(&dir_path(&dir)).await;
        store
            .persist_user_session(&create_user_session())
            .await
            .unwrap();
        store
            .persist_sync_token("old_token".to_string())
            .await
            .unwrap();

        store
            .persist_user_session(&create_user_session())
            .await
            .unwrap();

        let content = fs::read_to_string(get_path(&dir_path(&dir), "session"))
            .await
            .unwrap();
        assert!(!content.contains("sync_token"));
    }

    #[tokio::test]
    async fn test_persist_sync_token_without_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(&dir_path(&dir)).await;

        assert!(store.persist_sync_token("token".to_string()).await.is_err());
    }
}
