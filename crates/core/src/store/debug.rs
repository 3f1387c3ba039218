//! Auxiliary diagnostic store.
//!
//! The worker keeps a small side store of debug log lines and queued
//! offline actions for field diagnosis. It is independent of the cache
//! partitions and cleared wholesale by the CLEAR_SW_DEBUG_DB control verb.

use super::connection::CacheStore;
use crate::Error;
use tokio_rusqlite::params;

impl CacheStore {
    /// Append a debug log line.
    pub async fn log_debug(&self, level: &str, message: &str) -> Result<(), Error> {
        let level = level.to_string();
        let message = message.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT INTO debug_logs (level, message, logged_at) VALUES (?1, ?2, ?3)", params![
                    level, message, now
                ])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Queue an action recorded while offline (e.g. an RSVP to sync later).
    pub async fn queue_pending_action(&self, kind: &str, payload_json: &str) -> Result<(), Error> {
        let kind = kind.to_string();
        let payload_json = payload_json.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT INTO pending_actions (kind, payload_json, queued_at) VALUES (?1, ?2, ?3)", params![
                    kind,
                    payload_json,
                    now
                ])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all diagnostic rows.
    ///
    /// Returns the number of deleted rows across both tables.
    pub async fn clear_debug_store(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let logs = conn.execute("DELETE FROM debug_logs", [])?;
                let actions = conn.execute("DELETE FROM pending_actions", [])?;
                Ok((logs + actions) as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clear_debug_store() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.log_debug("warn", "cache write failed").await.unwrap();
        store.log_debug("info", "activated").await.unwrap();
        store.queue_pending_action("rsvp", r#"{"game_id":12}"#).await.unwrap();

        let cleared = store.clear_debug_store().await.unwrap();
        assert_eq!(cleared, 3);

        let again = store.clear_debug_store().await.unwrap();
        assert_eq!(again, 0);
    }
}
