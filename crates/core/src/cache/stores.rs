//! Versioned store operations.
//!
//! A store is a named bucket of request-identity → response entries. Stores
//! are created only by `open_store` and `put_batch`, written with upsert
//! (last write wins) and deleted wholesale when a newer version activates.
//! Single-entry writes never create a store, so a write racing a deletion
//! cannot bring a stale store back.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{RequestIdentity, ResponseSnapshot};
use chrono::{SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn ensure_store(conn: &rusqlite::Connection, store: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
        params![store, now()],
    )?;
    Ok(())
}

fn store_exists(conn: &rusqlite::Connection, store: &str) -> Result<bool, Error> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
        params![store],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

fn upsert_entry(
    conn: &rusqlite::Connection, store: &str, identity: &RequestIdentity, response: &ResponseSnapshot,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO cache_entries (
            store, key_hash, method, path, status_code, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(store, key_hash) DO UPDATE SET
            method = excluded.method,
            path = excluded.path,
            status_code = excluded.status_code,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            store,
            identity.key(),
            &identity.method,
            &identity.path,
            response.status as i64,
            headers_json,
            &response.body[..],
            now(),
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Create the store if it does not exist yet.
    pub async fn open_store(&self, store: &str) -> Result<(), Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| ensure_store(conn, &store))
            .await
            .map_err(Error::from)
    }

    /// Look up the response stored for `identity` in `store`.
    pub async fn match_entry(&self, store: &str, identity: &RequestIdentity) -> Result<Option<ResponseSnapshot>, Error> {
        let store = store.to_string();
        let key = identity.key();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let row = conn.query_row(
                    "SELECT status_code, headers_json, body FROM cache_entries
                     WHERE store = ?1 AND key_hash = ?2",
                    params![store, key],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                );

                let (status, headers_json, body) = match row {
                    Ok(r) => r,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;
                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                Ok(Some(ResponseSnapshot::new(status, headers, body)))
            })
            .await
            .map_err(Error::from)
    }

    /// Store `response` under `identity`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// `Error::UnknownStore` if `store` was never opened or has been deleted.
    pub async fn put_entry(
        &self, store: &str, identity: &RequestIdentity, response: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let store = store.to_string();
        let identity = identity.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                if !store_exists(conn, &store)? {
                    return Err(Error::UnknownStore(store));
                }
                upsert_entry(conn, &store, &identity, &response)
            })
            .await
            .map_err(Error::from)
    }

    /// Store every entry in a single transaction: either all land or none do.
    pub async fn put_batch(&self, store: &str, entries: Vec<(RequestIdentity, ResponseSnapshot)>) -> Result<(), Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store)?;
                for (identity, response) in &entries {
                    upsert_entry(&tx, &store, identity, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns whether the store existed.
    pub async fn delete_store(&self, store: &str) -> Result<bool, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![store])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all stores, newest first.
    pub async fn list_stores(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at DESC, rowid DESC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by `store`.
    pub async fn count_entries(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop the oldest entries of `store` until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_store(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        let store = store.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![&store], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store = ?1 AND key_hash IN (
                        SELECT key_hash FROM cache_entries WHERE store = ?1
                        ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                    )",
                    params![&store, count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
