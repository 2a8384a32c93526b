// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log with a per-conversation cap.

use rusqlite::{Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::records::{LayerProvenance, Message, MessageRole, NewMessage};

use crate::database::{Database, map_tr_err};
use crate::rows::{opt_parsed, parsed, time, to_ms};

const COLUMNS: &str =
    "seq, tenant_id, user_id, role, text, attachment_kind, attachment_url, layer, layer_name, author, created_at";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let layer: Option<i64> = row.get(7)?;
    let layer_name: Option<String> = row.get(8)?;
    Ok(Message {
        seq: row.get(0)?,
        tenant_id: row.get(1)?,
        user_id: row.get(2)?,
        role: parsed(row, 3)?,
        text: row.get(4)?,
        attachment_kind: opt_parsed(row, 5)?,
        attachment_url: row.get(6)?,
        provenance: layer.zip(layer_name).map(|(layer, layer_name)| LayerProvenance {
            layer,
            layer_name,
        }),
        author: row.get(9)?,
        created_at: time(row, 10)?,
    })
}

/// Appends a message, trims the log to `cap`, and refreshes the
/// conversation summary, all in one transaction.
pub async fn append(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    message: &NewMessage,
    cap: u32,
) -> Result<i64, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    let role = message.role.to_string();
    let counts_unread = message.role == MessageRole::Customer;
    let text = message.text.clone();
    let preview = message.preview();
    let attachment_kind = message.attachment_kind.map(|k| k.to_string());
    let attachment_url = message.attachment_url.clone();
    let layer = message.provenance.as_ref().map(|p| p.layer);
    let layer_name = message.provenance.as_ref().map(|p| p.layer_name.clone());
    let author = message.author.clone();
    let created_at = to_ms(message.created_at);
    let cap = cap.max(1) as i64;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (tenant_id, user_id, role, text, attachment_kind, attachment_url, layer, layer_name, author, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    tenant_id,
                    user_id,
                    role,
                    text,
                    attachment_kind,
                    attachment_url,
                    layer,
                    layer_name,
                    author,
                    created_at
                ],
            )?;
            let seq = tx.last_insert_rowid();

            tx.execute(
                "DELETE FROM messages
                 WHERE tenant_id = ?1 AND user_id = ?2 AND seq <= (
                    SELECT seq FROM messages WHERE tenant_id = ?1 AND user_id = ?2
                    ORDER BY seq DESC LIMIT 1 OFFSET ?3
                 )",
                params![tenant_id, user_id, cap],
            )?;

            tx.execute(
                "UPDATE conversations SET
                    last_message = ?3, last_message_at = ?4, last_message_role = ?5,
                    message_count = message_count + 1,
                    unread_count = unread_count + ?6
                 WHERE tenant_id = ?1 AND user_id = ?2",
                params![tenant_id, user_id, preview, created_at, role, counts_unread as i64],
            )?;
            tx.commit()?;
            Ok(seq)
        })
        .await
        .map_err(map_tr_err)
}

/// The `limit` most recent messages, oldest first.
pub async fn recent(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    limit: u32,
) -> Result<Vec<Message>, SwitchboardError> {
    page(db, tenant_id, user_id, None, limit).await
}

/// A page of messages older than `before_seq` (or the newest page), oldest first.
pub async fn page(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    before_seq: Option<i64>,
    limit: u32,
) -> Result<Vec<Message>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    let before = before_seq.unwrap_or(i64::MAX);
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM (
                    SELECT {COLUMNS} FROM messages
                    WHERE tenant_id = ?1 AND user_id = ?2 AND seq < ?3
                    ORDER BY seq DESC LIMIT ?4
                 ) ORDER BY seq ASC"
            ))?;
            let rows = stmt
                .query_map(params![tenant_id, user_id, before, limit], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of stored messages for a conversation.
pub async fn count(db: &Database, tenant_id: &str, user_id: &str) -> Result<i64, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE tenant_id = ?1 AND user_id = ?2",
                params![tenant_id, user_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
