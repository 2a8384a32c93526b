// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so each
//! `call` closure executes atomically with respect to other callers of the
//! same connection. Cross-process writers rely on SQLite's own locking plus
//! single-statement atomic updates.

use std::path::Path;

use switchboard_core::SwitchboardError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into `SwitchboardError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SwitchboardError {
    SwitchboardError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the shared SQLite store.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs, and
    /// runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SwitchboardError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(SwitchboardError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(|e| map_tr_err(e.into()))?;
        Self::prepare(conn, wal_mode).await
    }

    /// Opens a private in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self, SwitchboardError> {
        let conn = Connection::open_in_memory().await.map_err(|e| map_tr_err(e.into()))?;
        Self::prepare(conn, false).await
    }

    async fn prepare(conn: Connection, wal_mode: bool) -> Result<Self, SwitchboardError> {
        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            Ok(migrations::run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(wal_mode, "database ready");
        Ok(Self { conn })
    }

    /// The underlying connection. Clones share the same background thread.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), SwitchboardError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<(), SwitchboardError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

        let tables: i64 = db
            .connection()
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('conversations', 'messages', 'idempotency_keys', 'learned_entries', 'usage_daily')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
            .unwrap();
        assert_eq!(tables, 5);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let path = path.to_str().unwrap();
        Database::open(path, true).await.unwrap().close().await.unwrap();
        Database::open(path, true).await.unwrap();
    }
}
