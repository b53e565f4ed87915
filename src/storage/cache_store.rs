//! Named, versioned response stores.
//!
//! A store maps a normalized request key (method + URL) to the most recently
//! written response snapshot. Stores are never mutated across versions: a new
//! version gets a new store and activation deletes the old ones.
//!
//! # Atomicity
//! - `put` replaces one row in a single statement, so a reader never sees a
//!   partially written response. It only writes into a store that exists:
//!   a late write never brings back a store that activation deleted.
//! - `put_all` writes a batch in one transaction; either every entry lands or
//!   none does. Install uses this to commit the precache manifest.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Transaction, params};

use crate::core::models::{CacheKey, FetchResponse, ResponseSource, StoredEntry};
use crate::error::{Result, ShowroomError};
use crate::storage::db::WorkerDb;

/// Access to every named store in the worker database.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    db: WorkerDb,
}

impl CacheStorage {
    /// Wrap a worker database.
    #[must_use]
    pub const fn new(db: WorkerDb) -> Self {
        Self { db }
    }

    /// The underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &WorkerDb {
        &self.db
    }

    /// Create the named store if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn open_store(&self, name: &str) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )
        .map_err(|e| ShowroomError::Storage(format!("open store {name}: {e}")))?;
        Ok(())
    }

    /// Whether the named store exists.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn has_store(&self, name: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM cache_stores WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ShowroomError::Storage(format!("lookup store {name}: {e}")))?;
        Ok(found.is_some())
    }

    /// Names of every store, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn store_names(&self) -> Result<Vec<String>> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare("SELECT name FROM cache_stores ORDER BY created_at, name")
            .map_err(|e| ShowroomError::Storage(format!("prepare store list: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ShowroomError::Storage(format!("list stores: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ShowroomError::Storage(format!("read store names: {e}")))
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns whether the store existed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub fn delete_store(&self, name: &str) -> Result<bool> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ShowroomError::Storage(format!("begin delete {name}: {e}")))?;
        tx.execute("DELETE FROM cache_entries WHERE store_name = ?1", [name])
            .map_err(|e| ShowroomError::Storage(format!("delete entries of {name}: {e}")))?;
        let removed = tx
            .execute("DELETE FROM cache_stores WHERE name = ?1", [name])
            .map_err(|e| ShowroomError::Storage(format!("delete store {name}: {e}")))?;
        tx.commit()
            .map_err(|e| ShowroomError::Storage(format!("commit delete {name}: {e}")))?;
        Ok(removed > 0)
    }

    /// Write one entry, replacing any previous response for the key.
    ///
    /// Returns `false` without writing if the store does not exist.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn put(&self, store: &str, key: &CacheKey, response: &FetchResponse) -> Result<bool> {
        let start = Instant::now();
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ShowroomError::Storage(format!("begin put: {e}")))?;
        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM cache_stores WHERE name = ?1", [store], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| ShowroomError::Storage(format!("lookup store {store}: {e}")))?;
        if exists.is_none() {
            tracing::debug!(store, key = %key, "Store no longer exists, dropping write");
            return Ok(false);
        }
        write_entry(&tx, store, key, response)?;
        tx.commit()
            .map_err(|e| ShowroomError::Storage(format!("commit put: {e}")))?;

        tracing::trace!(
            store,
            key = %key,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Cache put"
        );
        Ok(true)
    }

    /// Write a batch of entries in one transaction, creating the store if needed.
    ///
    /// # Errors
    /// Returns an error if any write fails; nothing is committed in that case.
    pub fn put_all(&self, store: &str, entries: &[(CacheKey, FetchResponse)]) -> Result<()> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ShowroomError::Storage(format!("begin batch: {e}")))?;
        create_store(&tx, store)?;
        for (key, response) in entries {
            write_entry(&tx, store, key, response)?;
        }
        tx.commit()
            .map_err(|e| ShowroomError::Storage(format!("commit batch: {e}")))?;
        Ok(())
    }

    /// Look up the response stored for a key.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored row is corrupt.
    pub fn match_key(&self, store: &str, key: &CacheKey) -> Result<Option<FetchResponse>> {
        Ok(self.match_entry(store, key)?.map(|entry| entry.response))
    }

    /// Look up the full stored entry (response plus write time) for a key.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored row is corrupt.
    pub fn match_entry(&self, store: &str, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let conn = self.db.lock()?;
        let row = conn
            .query_row(
                "SELECT status, headers, body, stored_at FROM cache_entries \
                 WHERE store_name = ?1 AND method = ?2 AND url = ?3",
                params![store, key.method, key.url],
                |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| ShowroomError::Storage(format!("match {key}: {e}")))?;

        row.map(|(status, headers, body, stored_at)| {
            Ok(StoredEntry {
                key: key.clone(),
                response: FetchResponse {
                    status,
                    headers: serde_json::from_str(&headers)?,
                    body,
                    source: ResponseSource::Cache,
                },
                stored_at: parse_timestamp(&stored_at)?,
            })
        })
        .transpose()
    }

    /// Remove one entry. Returns whether it existed.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn delete(&self, store: &str, key: &CacheKey) -> Result<bool> {
        let conn = self.db.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM cache_entries WHERE store_name = ?1 AND method = ?2 AND url = ?3",
                params![store, key.method, key.url],
            )
            .map_err(|e| ShowroomError::Storage(format!("delete {key}: {e}")))?;
        Ok(removed > 0)
    }

    /// Keys held in a store, sorted by method then URL.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn keys(&self, store: &str) -> Result<Vec<CacheKey>> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT method, url FROM cache_entries WHERE store_name = ?1 \
                 ORDER BY method, url",
            )
            .map_err(|e| ShowroomError::Storage(format!("prepare keys: {e}")))?;
        let rows = stmt
            .query_map([store], |row| {
                Ok(CacheKey {
                    method: row.get(0)?,
                    url: row.get(1)?,
                })
            })
            .map_err(|e| ShowroomError::Storage(format!("list keys of {store}: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ShowroomError::Storage(format!("read keys of {store}: {e}")))
    }

    /// Number of entries in a store.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn entry_count(&self, store: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                [store],
                |row| row.get(0),
            )
            .map_err(|e| ShowroomError::Storage(format!("count {store}: {e}")))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn create_store(tx: &Transaction<'_>, store: &str) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
        params![store, Utc::now().to_rfc3339()],
    )
    .map_err(|e| ShowroomError::Storage(format!("open store {store}: {e}")))?;
    Ok(())
}

fn write_entry(
    tx: &Transaction<'_>,
    store: &str,
    key: &CacheKey,
    response: &FetchResponse,
) -> Result<()> {
    let headers: Vec<&(String, String)> = response
        .headers
        .iter()
        .filter(|(name, _)| !is_per_client_header(name))
        .collect();
    let headers = serde_json::to_string(&headers)?;
    tx.execute(
        "INSERT INTO cache_entries (store_name, method, url, status, headers, body, stored_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(store_name, method, url) DO UPDATE SET \
            status = excluded.status, headers = excluded.headers, \
            body = excluded.body, stored_at = excluded.stored_at",
        params![
            store,
            key.method,
            key.url,
            response.status,
            headers,
            response.body,
            Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| ShowroomError::Storage(format!("write {key}: {e}")))?;
    Ok(())
}

/// Headers that belong to one client and must never be replayed to another.
fn is_per_client_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("set-cookie") || name.eq_ignore_ascii_case("set-cookie2")
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ShowroomError::Storage(format!("corrupt timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> CacheStorage {
        CacheStorage::new(WorkerDb::open_in_memory().unwrap())
    }

    fn key(path: &str) -> CacheKey {
        CacheKey {
            method: "GET".to_string(),
            url: format!("https://cars.example{path}"),
        }
    }

    #[test]
    fn put_then_match_returns_cache_sourced_copy() {
        let storage = storage();
        storage.open_store("showroom-v1").unwrap();
        let response = FetchResponse::network(200, "<html>home</html>")
            .with_header("content-type", "text/html");

        storage.put("showroom-v1", &key("/"), &response).unwrap();
        let hit = storage.match_key("showroom-v1", &key("/")).unwrap().unwrap();

        assert_eq!(hit.body, response.body);
        assert_eq!(hit.headers, response.headers);
        assert_eq!(hit.source, ResponseSource::Cache);
    }

    #[test]
    fn put_never_recreates_a_deleted_store() {
        let storage = storage();
        storage.put_all("showroom-v1", &[(key("/"), FetchResponse::network(200, "v1"))]).unwrap();
        storage.delete_store("showroom-v1").unwrap();

        let written = storage
            .put("showroom-v1", &key("/inventory"), &FetchResponse::network(200, "late"))
            .unwrap();
        assert!(!written);
        assert!(!storage.has_store("showroom-v1").unwrap());
        assert!(storage.store_names().unwrap().is_empty());
    }

    #[test]
    fn cookies_are_not_persisted() {
        let storage = storage();
        storage.open_store("s").unwrap();
        let response = FetchResponse::network(200, "{}")
            .with_header("content-type", "application/json")
            .with_header("Set-Cookie", "session=alice; HttpOnly");

        assert!(storage.put("s", &key("/api/inventory"), &response).unwrap());
        let hit = storage.match_key("s", &key("/api/inventory")).unwrap().unwrap();
        assert_eq!(hit.header("content-type"), Some("application/json"));
        assert_eq!(hit.header("set-cookie"), None);
    }

    #[test]
    fn put_replaces_previous_response() {
        let storage = storage();
        storage.open_store("s").unwrap();
        storage.put("s", &key("/a"), &FetchResponse::network(200, "one")).unwrap();
        storage.put("s", &key("/a"), &FetchResponse::network(200, "two")).unwrap();

        assert_eq!(storage.entry_count("s").unwrap(), 1);
        assert_eq!(storage.match_key("s", &key("/a")).unwrap().unwrap().text(), "two");
    }

    #[test]
    fn stores_are_isolated() {
        let storage = storage();
        storage.put_all("old", &[(key("/a"), FetchResponse::network(200, "old"))]).unwrap();
        storage.put_all("new", &[(key("/a"), FetchResponse::network(200, "new"))]).unwrap();

        assert!(storage.delete_store("old").unwrap());
        assert!(!storage.has_store("old").unwrap());
        assert_eq!(storage.store_names().unwrap(), vec!["new".to_string()]);
        assert_eq!(storage.match_key("new", &key("/a")).unwrap().unwrap().text(), "new");
        assert_eq!(storage.entry_count("old").unwrap(), 0);
    }

    #[test]
    fn keys_and_delete() {
        let storage = storage();
        storage
            .put_all(
                "s",
                &[
                    (key("/b"), FetchResponse::network(200, "b")),
                    (key("/a"), FetchResponse::network(200, "a")),
                ],
            )
            .unwrap();

        let keys = storage.keys("s").unwrap();
        assert_eq!(keys, vec![key("/a"), key("/b")]);

        assert!(storage.delete("s", &key("/a")).unwrap());
        assert!(!storage.delete("s", &key("/a")).unwrap());
        assert_eq!(storage.entry_count("s").unwrap(), 1);
    }
}
