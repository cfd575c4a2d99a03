//! Container and entry CRUD operations.
//!
//! Writes are last-write-wins upserts: overwriting an entry with a fresher
//! response is always safe, so no read-modify-write is attempted.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::entry::{CachedEntry, RequestIdentity};
use crate::Error;
use crate::db::Db;

/// Named, versioned key→response containers.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: Db,
}

fn decode_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, u16, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_entry(raw: (String, String, u16, String, Vec<u8>)) -> Result<CachedEntry, Error> {
    let (method, url, status, headers_json, body) = raw;
    let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)?;
    Ok(CachedEntry { identity: RequestIdentity { method, url }, status, headers, body: Bytes::from(body) })
}

impl CacheStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a container if it doesn't exist yet.
    pub async fn open_container(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_containers (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry, creating the container on first use.
    pub async fn put(&self, container: &str, entry: &CachedEntry) -> Result<(), Error> {
        let container = container.to_string();
        let key = entry.identity.key();
        let method = entry.identity.method.clone();
        let url = entry.identity.url.clone();
        let status = entry.status;
        let headers_json = serde_json::to_string(&entry.headers)?;
        let body = entry.body.to_vec();
        let now = Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_containers (name, created_at) VALUES (?1, ?2)",
                    params![container, now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (container, key_hash, method, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(container, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![container, key, method, url, status, headers_json, body, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry in one container.
    ///
    /// Returns None if the container or the entry doesn't exist.
    pub async fn get(&self, container: &str, identity: &RequestIdentity) -> Result<Option<CachedEntry>, Error> {
        let container = container.to_string();
        let key = identity.key();
        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<_>, Error> {
                let result = conn.query_row(
                    "SELECT method, url, status, headers_json, body
                    FROM cache_entries WHERE container = ?1 AND key_hash = ?2",
                    params![container, key],
                    decode_entry,
                );

                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(into_entry).transpose()
    }

    /// First hit across `containers`, searched in the given order.
    pub async fn match_any(
        &self, containers: &[String], identity: &RequestIdentity,
    ) -> Result<Option<CachedEntry>, Error> {
        for container in containers {
            if let Some(entry) = self.get(container, identity).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Every entry of a container, ordered by URL.
    pub async fn entries(&self, container: &str) -> Result<Vec<CachedEntry>, Error> {
        let container = container.to_string();
        let rows = self
            .db
            .conn
            .call(move |conn| -> Result<Vec<_>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, body
                    FROM cache_entries WHERE container = ?1 ORDER BY url ASC",
                )?;
                let rows = stmt
                    .query_map(params![container], decode_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter().map(into_entry).collect()
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn delete_entry(&self, container: &str, identity: &RequestIdentity) -> Result<bool, Error> {
        let container = container.to_string();
        let key = identity.key();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE container = ?1 AND key_hash = ?2",
                    params![container, key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a container and all of its entries. Returns whether it existed.
    pub async fn delete_container(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE container = ?1", params![name])?;
                let count = tx.execute("DELETE FROM cache_containers WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all containers, sorted.
    pub async fn list_containers(&self) -> Result<Vec<String>, Error> {
        self.db
            .conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_containers ORDER BY name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self, container: &str) -> Result<u64, Error> {
        let container = container.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE container = ?1",
                    params![container],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
