//! Partition registry operations.
//!
//! Partitions are named, independently addressable stores of response
//! snapshots. Activation reconciles the set of live partitions against the
//! current cache version by deleting everything that does not match.

use super::connection::CacheStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Per-partition entry counts and URL lists, as reported to GET_CACHE_STATS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStats {
    pub name: String,
    pub entries: u64,
    pub urls: Vec<String>,
}

impl CacheStore {
    /// Register a partition. Idempotent; creates it if absent.
    pub async fn open_partition(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)", params![
                    name, now
                ])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing partitions.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every partition (and, by cascade, its entries) whose name is
    /// not in the provided current set. Implements version cutover at
    /// activation.
    ///
    /// Returns the number of deleted partitions.
    pub async fn delete_non_current_partitions(&self, current: &[String]) -> Result<u64, Error> {
        let current = current.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions")?;
                let existing = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                drop(stmt);

                let mut deleted = 0u64;
                for name in existing {
                    if !current.contains(&name) {
                        conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                        deleted += 1;
                    }
                }
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all partitions and all entries. Idempotent.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM entries", [])?;
                conn.execute("DELETE FROM partitions", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in one partition.
    pub async fn count_entries(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry URLs of one partition, in insertion order.
    pub async fn list_urls(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY id ASC")?;
                let urls = stmt
                    .query_map(params![partition], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Per-partition entry counts and URL lists.
    pub async fn stats(&self) -> Result<Vec<PartitionStats>, Error> {
        let mut stats = Vec::new();
        for name in self.list_partitions().await? {
            let entries = self.count_entries(&name).await?;
            let urls = self.list_urls(&name).await?;
            stats.push(PartitionStats { name, entries, urls });
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredResponse;

    fn body(text: &str) -> StoredResponse {
        StoredResponse::with_content_type(200, "text/plain", text.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_open_partition_idempotent() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.open_partition("sideout-static-v3").await.unwrap();
        store.open_partition("sideout-static-v3").await.unwrap();
        assert_eq!(store.list_partitions().await.unwrap(), vec!["sideout-static-v3"]);
    }

    #[tokio::test]
    async fn test_version_cutover_deletes_old_partitions() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let url = "https://sideout.app/index.html";
        store.put("sideout-static-v2", "GET", url, &body("old shell")).await.unwrap();
        store.put("sideout-runtime-v2", "GET", "https://sideout.app/api/games", &body("games")).await.unwrap();
        store.put("sideout-static-v3", "GET", url, &body("new shell")).await.unwrap();

        let current = vec![
            "sideout-static-v3".to_string(),
            "sideout-dynamic-v3".to_string(),
            "sideout-runtime-v3".to_string(),
        ];
        let deleted = store.delete_non_current_partitions(&current).await.unwrap();
        assert_eq!(deleted, 2);

        // old-version entries are gone with their partitions
        assert!(store.get("sideout-static-v2", "GET", url).await.unwrap().is_none());
        let order = ["sideout-runtime-v2".to_string()];
        assert!(store.lookup("GET", "https://sideout.app/api/games", &order).await.unwrap().is_none());
        assert!(store.get("sideout-static-v3", "GET", url).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_all_idempotent() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.put("sideout-static-v3", "GET", "https://sideout.app/a", &body("a")).await.unwrap();
        store.put("sideout-dynamic-v3", "GET", "https://sideout.app/b", &body("b")).await.unwrap();

        let first = store.clear_all().await.unwrap();
        assert_eq!(first, 2);
        assert!(store.list_partitions().await.unwrap().is_empty());

        let second = store.clear_all().await.unwrap();
        assert_eq!(second, 0);
        assert!(store.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_counts_and_urls() {
        let store = CacheStore::open_in_memory().await.unwrap();
        for i in 0..3 {
            store
                .put("sideout-static-v3", "GET", &format!("https://sideout.app/s/{i}"), &body("s"))
                .await
                .unwrap();
            store
                .put("sideout-runtime-v3", "GET", &format!("https://sideout.app/r/{i}"), &body("r"))
                .await
                .unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        for s in &stats {
            assert_eq!(s.entries, 3);
            assert_eq!(s.urls.len(), 3);
        }
        let runtime = stats.iter().find(|s| s.name == "sideout-runtime-v3").unwrap();
        assert!(runtime.urls.contains(&"https://sideout.app/r/0".to_string()));
    }
}
