use crate::error::{RaffleError, Result};
use crate::storage::Storage;
use crate::types::SharedSessionState;
use chrono::{DateTime, Utc};
use rusqlite::params;

/// Reads and writes the cached [`SharedSessionState`] under one key.
pub struct SessionStore<'a> {
    storage: &'a Storage,
    key: &'a str,
}

impl<'a> SessionStore<'a> {
    pub fn new(storage: &'a Storage, key: &'a str) -> Self {
        Self { storage, key }
    }

    pub async fn save(&self, state: &SharedSessionState) -> Result<()> {
        let body = serde_json::to_string(state)?;
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO documents (key, body, updated_at) VALUES (?1, ?2, ?3)",
            params![self.key, body, Utc::now().timestamp_millis()],
        )?;

        Ok(())
    }

    /// The cached document, or `None` when nothing usable is stored. A
    /// corrupt body is logged and treated as absent. A body without
    /// `lastUpdated` is stamped with `now`.
    pub async fn load(
        &self,
        total_prizes: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<SharedSessionState>> {
        let conn = self.storage.get_connection().await;

        let result = conn.query_row(
            "SELECT body FROM documents WHERE key = ?1",
            params![self.key],
            |row| row.get::<_, String>(0),
        );

        let body = match result {
            Ok(body) => body,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(RaffleError::Storage(e)),
        };
        drop(conn);

        let parsed = serde_json::from_str(&body)
            .map_err(RaffleError::from)
            .and_then(|value| SharedSessionState::from_value(value, total_prizes, now));

        match parsed {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached document '{}': {}", self.key, e);
                Ok(None)
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute("DELETE FROM documents WHERE key = ?1", params![self.key])?;
        Ok(())
    }
}
