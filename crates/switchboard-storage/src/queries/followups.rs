// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up flags and the idle-conversation scan that feeds them.

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::records::{Conversation, FollowUp};

use crate::database::{Database, map_tr_err};
use crate::queries::conversations::{COLUMNS, row_to_conversation};
use crate::rows::{time, to_ms};

fn row_to_followup(row: &Row<'_>) -> rusqlite::Result<FollowUp> {
    Ok(FollowUp {
        tenant_id: row.get(0)?,
        user_id: row.get(1)?,
        needs_followup: row.get(2)?,
        reason: row.get(3)?,
        analyzed_at: time(row, 4)?,
    })
}

/// Records the latest analysis for a conversation.
pub async fn set(db: &Database, followup: &FollowUp) -> Result<(), SwitchboardError> {
    let f = followup.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO followups (tenant_id, user_id, needs_followup, reason, analyzed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tenant_id, user_id) DO UPDATE SET
                    needs_followup = excluded.needs_followup,
                    reason = excluded.reason,
                    analyzed_at = excluded.analyzed_at",
                params![f.tenant_id, f.user_id, f.needs_followup, f.reason, to_ms(f.analyzed_at)],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Clears the flag. Returns false when nothing was flagged.
pub async fn dismiss(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
) -> Result<bool, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE followups SET needs_followup = 0
                 WHERE tenant_id = ?1 AND user_id = ?2 AND needs_followup = 1",
                params![tenant_id, user_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations currently flagged for follow-up, most recently analyzed first.
pub async fn pending(db: &Database, tenant_id: &str) -> Result<Vec<FollowUp>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tenant_id, user_id, needs_followup, reason, analyzed_at FROM followups
                 WHERE tenant_id = ?1 AND needs_followup = 1
                 ORDER BY analyzed_at DESC",
            )?;
            let rows = stmt
                .query_map(params![tenant_id], row_to_followup)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations whose last message came from the customer, is older than
/// `idle_before` but newer than `since`, and has not been analyzed yet.
pub async fn idle_conversations(
    db: &Database,
    tenant_id: &str,
    since: DateTime<Utc>,
    idle_before: DateTime<Utc>,
) -> Result<Vec<Conversation>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let since = to_ms(since);
    let idle_before = to_ms(idle_before);
    db.connection()
        .call(move |conn| {
            let columns = COLUMNS
                .split(", ")
                .map(|c| format!("c.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {columns} FROM conversations c
                 LEFT JOIN followups f ON f.tenant_id = c.tenant_id AND f.user_id = c.user_id
                 WHERE c.tenant_id = ?1
                   AND c.last_message_role = 'customer'
                   AND c.last_message_at IS NOT NULL
                   AND c.last_message_at >= ?2 AND c.last_message_at < ?3
                   AND (f.analyzed_at IS NULL OR f.analyzed_at < c.last_message_at)
                 ORDER BY c.last_message_at ASC"
            ))?;
            let rows = stmt
                .query_map(params![tenant_id, since, idle_before], row_to_conversation)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
