//! Entry CRUD operations.
//!
//! An entry is a stored response snapshot keyed by request identity
//! (method + URL) inside one named partition. Entries carry no timestamp;
//! their autoincrement row id is the insertion order used for pruning.

use super::connection::CacheStore;
use super::hash::compute_entry_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot: status, headers, body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    /// Build a response with a single Content-Type header.
    pub fn with_content_type(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self { status, headers: vec![("content-type".to_string(), content_type.to_string())], body }
    }

    /// Whether the snapshot records a 2xx response.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content-Type header value, if recorded.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

fn row_to_response(row: &rusqlite::Row<'_>) -> Result<StoredResponse, rusqlite::Error> {
    let status: u16 = row.get(0)?;
    let headers_json: Option<String> = row.get(1)?;
    let body: Option<Vec<u8>> = row.get(2)?;
    let headers = headers_json
        .and_then(|j| serde_json::from_str(&j).ok())
        .unwrap_or_default();
    Ok(StoredResponse { status, headers, body: body.unwrap_or_default() })
}

impl CacheStore {
    /// Insert or update a stored response for a request identity.
    ///
    /// Registers the partition lazily (the Runtime partition is created on
    /// first write). Uses UPSERT semantics; an overwrite keeps the original
    /// row id, so re-putting a key does not refresh its eviction position.
    pub async fn put(&self, partition: &str, method: &str, url: &str, response: &StoredResponse) -> Result<(), Error> {
        let partition = partition.to_string();
        let key = compute_entry_key(method, url);
        let method = method.to_ascii_uppercase();
        let url = url.to_string();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("unserializable header map: {e}")))?;
        let body = response.body.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, now],
                )?;
                conn.execute(
                    "INSERT INTO entries (partition, key, url, method, status, headers_json, body)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(partition, key) DO UPDATE SET
                        url = excluded.url,
                        method = excluded.method,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body",
                    params![partition, key, url, method, status, headers_json, body],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a stored response from a single partition.
    ///
    /// Returns None if the partition holds no entry for this identity.
    pub async fn get(&self, partition: &str, method: &str, url: &str) -> Result<Option<StoredResponse>, Error> {
        let partition = partition.to_string();
        let key = compute_entry_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt =
                    conn.prepare("SELECT status, headers_json, body FROM entries WHERE partition = ?1 AND key = ?2")?;

                let result = stmt.query_row(params![partition, key], row_to_response);

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Union lookup across partitions in an explicit, caller-supplied order.
    ///
    /// The first partition holding the identity wins. Replaces the
    /// platform-style search-all lookup with a deterministic one.
    pub async fn lookup(&self, method: &str, url: &str, order: &[String]) -> Result<Option<StoredResponse>, Error> {
        for partition in order {
            if let Some(response) = self.get(partition, method, url).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Delete the oldest-inserted entries of a partition until its count is
    /// at or below `max_entries`.
    ///
    /// Returns the number of deleted entries.
    pub async fn prune_oldest_entries(&self, partition: &str, max_entries: usize) -> Result<u64, Error> {
        let partition = partition.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE id IN (
                    SELECT id FROM entries WHERE partition = ?1 ORDER BY id ASC LIMIT ?2
                )",
                    params![partition, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries across all partitions whose URL looks like an app
    /// icon, favicon, or manifest resource.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear_icon_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries
                    WHERE url LIKE '%icon%' OR url LIKE '%favicon%' OR url LIKE '%manifest%'",
                    [],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> StoredResponse {
        StoredResponse::with_content_type(200, "text/html", body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let response = page("<html>roster</html>");

        store
            .put("sideout-static-v3", "GET", "https://sideout.app/index.html", &response)
            .await
            .unwrap();

        let found = store
            .get("sideout-static-v3", "GET", "https://sideout.app/index.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, response);
        assert_eq!(found.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let found = store
            .get("sideout-static-v3", "GET", "https://sideout.app/nope.html")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_identity() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let url = "https://sideout.app/js/app.js";

        store.put("sideout-dynamic-v3", "GET", url, &page("old")).await.unwrap();
        store.put("sideout-dynamic-v3", "GET", url, &page("new")).await.unwrap();

        let found = store.get("sideout-dynamic-v3", "GET", url).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
        assert_eq!(store.count_entries("sideout-dynamic-v3").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_order_first_hit_wins() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let url = "https://sideout.app/index.html";

        store.put("sideout-static-v3", "GET", url, &page("stale")).await.unwrap();
        store.put("sideout-runtime-v3", "GET", url, &page("fresh")).await.unwrap();

        let order = ["sideout-runtime-v3".to_string(), "sideout-dynamic-v3".to_string(), "sideout-static-v3".to_string()];
        let found = store.lookup("GET", url, &order).await.unwrap().unwrap();
        assert_eq!(found.body, b"fresh");
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent() {
        let store = CacheStore::open_in_memory().await.unwrap();
        for i in 0..5 {
            let url = format!("https://sideout.app/api/games/{i}");
            store.put("sideout-runtime-v3", "GET", &url, &page(&format!("game {i}"))).await.unwrap();
        }

        let deleted = store.prune_oldest_entries("sideout-runtime-v3", 2).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count_entries("sideout-runtime-v3").await.unwrap(), 2);

        // the most-recently-inserted entries survive
        assert!(store.get("sideout-runtime-v3", "GET", "https://sideout.app/api/games/4").await.unwrap().is_some());
        assert!(store.get("sideout-runtime-v3", "GET", "https://sideout.app/api/games/3").await.unwrap().is_some());
        assert!(store.get("sideout-runtime-v3", "GET", "https://sideout.app/api/games/0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_under_bound_is_noop() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.put("sideout-runtime-v3", "GET", "https://sideout.app/api/games", &page("g")).await.unwrap();
        let deleted = store.prune_oldest_entries("sideout-runtime-v3", 50).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_clear_icon_entries() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store
            .put("sideout-static-v3", "GET", "https://sideout.app/img/icons/icon-192.png", &page("png"))
            .await
            .unwrap();
        store.put("sideout-static-v3", "GET", "https://sideout.app/manifest.json", &page("{}")).await.unwrap();
        store.put("sideout-static-v3", "GET", "https://sideout.app/index.html", &page("app")).await.unwrap();

        let deleted = store.clear_icon_entries().await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.get("sideout-static-v3", "GET", "https://sideout.app/index.html").await.unwrap().is_some());
    }
}
