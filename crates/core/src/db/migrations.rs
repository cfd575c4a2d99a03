//! Schema migrations for both stores.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its version row.

use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use tokio_rusqlite::{Connection, params};

use crate::Error;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "cache_entries", sql: include_str!("../../migrations/001_cache_entries.sql") },
    Migration { version: 2, name: "event_queue", sql: include_str!("../../migrations/002_event_queue.sql") },
];

fn applied_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    let version = conn
        .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get::<_, Option<i64>>(0))
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the migration whose SQL failed;
/// earlier migrations stay applied.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let current = applied_version(conn)?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let failed = |e: rusqlite::Error| Error::MigrationFailed(format!("{}: {e}", migration.name));
            let tx = conn.transaction().map_err(failed)?;
            tx.execute_batch(migration.sql).map_err(failed)?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![migration.version, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(failed)?;
            tx.commit().map_err(failed)?;
            tracing::debug!(version = migration.version, name = migration.name, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
