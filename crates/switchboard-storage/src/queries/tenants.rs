// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-wide bot switch.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use switchboard_core::SwitchboardError;

use crate::database::{Database, map_tr_err};
use crate::rows::to_ms;

/// Returns the stored tenant switch, or `default` when never toggled.
pub async fn tenant_bot_enabled(
    db: &Database,
    tenant_id: &str,
    default: bool,
) -> Result<bool, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let stored: Option<bool> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT bot_enabled FROM tenant_settings WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(stored.unwrap_or(default))
}

pub async fn set_tenant_bot_enabled(
    db: &Database,
    tenant_id: &str,
    enabled: bool,
    updated_by: &str,
    now: DateTime<Utc>,
) -> Result<(), SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let updated_by = updated_by.to_string();
    let now = to_ms(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenant_settings (tenant_id, bot_enabled, updated_by, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                    bot_enabled = excluded.bot_enabled,
                    updated_by = excluded.updated_by,
                    updated_at = excluded.updated_at",
                params![tenant_id, enabled, updated_by, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_until_toggled() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(tenant_bot_enabled(&db, "t", true).await.unwrap());
        set_tenant_bot_enabled(&db, "t", false, "alice", Utc::now()).await.unwrap();
        assert!(!tenant_bot_enabled(&db, "t", true).await.unwrap());
        assert!(tenant_bot_enabled(&db, "other", true).await.unwrap());
    }
}
