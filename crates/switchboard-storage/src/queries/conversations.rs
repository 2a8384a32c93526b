// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation records and control-state writes.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use switchboard_core::records::Conversation;
use switchboard_core::state::{ConversationControl, Pin};
use switchboard_core::{ChannelKind, SwitchboardError, UserProfile};

use crate::database::{Database, map_tr_err};
use crate::rows::{opt_parsed, opt_time, parsed, time, to_ms};

pub(crate) const COLUMNS: &str = "tenant_id, user_id, display_name, picture_url, source, state, \
     pin_reason, pinned_at, assigned_admin, control_version, last_message, last_message_at, \
     last_message_role, unread_count, message_count, created_at";

pub(crate) fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let pin_reason: Option<String> = row.get(6)?;
    let pinned_at = opt_time(row, 7)?;
    let pin = pin_reason.map(|reason| Pin {
        reason,
        pinned_at: pinned_at.unwrap_or(DateTime::UNIX_EPOCH),
    });
    Ok(Conversation {
        tenant_id: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        picture_url: row.get(3)?,
        source: parsed(row, 4)?,
        control: ConversationControl {
            state: parsed(row, 5)?,
            pin,
            assigned_admin: row.get(8)?,
        },
        control_version: row.get(9)?,
        last_message: row.get(10)?,
        last_message_at: opt_time(row, 11)?,
        last_message_role: opt_parsed(row, 12)?,
        unread_count: row.get(13)?,
        message_count: row.get(14)?,
        created_at: time(row, 15)?,
    })
}

/// Fetches the conversation, creating it on first contact.
///
/// Profile fields are only overwritten by non-empty values that differ from
/// what is stored.
pub async fn get_or_create(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    source: ChannelKind,
    profile: &UserProfile,
    now: DateTime<Utc>,
) -> Result<Conversation, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    let source = source.to_string();
    let display_name = profile.display_name.clone().filter(|n| !n.trim().is_empty());
    let picture_url = profile.picture_url.clone().filter(|p| !p.trim().is_empty());
    let now = to_ms(now);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO conversations (tenant_id, user_id, display_name, picture_url, source, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(tenant_id, user_id) DO UPDATE SET
                        display_name = COALESCE(excluded.display_name, conversations.display_name),
                        picture_url = COALESCE(excluded.picture_url, conversations.picture_url)
                     RETURNING {COLUMNS}"
                ),
                params![tenant_id, user_id, display_name, picture_url, source, now],
                row_to_conversation,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
) -> Result<Option<Conversation>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE tenant_id = ?1 AND user_id = ?2"),
                params![tenant_id, user_id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Filter for conversation listings.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub pinned: Option<bool>,
    pub assigned_admin: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Lists conversations, most recently active first.
pub async fn list(
    db: &Database,
    tenant_id: &str,
    filter: &ConversationFilter,
) -> Result<Vec<Conversation>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let pinned = filter.pinned;
    let assigned = filter.assigned_admin.clone();
    let limit = filter.limit.max(1) as i64;
    let offset = filter.offset as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conversations
                 WHERE tenant_id = ?1
                   AND (?2 IS NULL OR pinned = ?2)
                   AND (?3 IS NULL OR assigned_admin = ?3)
                 ORDER BY COALESCE(last_message_at, created_at) DESC
                 LIMIT ?4 OFFSET ?5"
            ))?;
            let rows = stmt
                .query_map(params![tenant_id, pinned, assigned, limit, offset], row_to_conversation)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Compare-and-set write of the control state.
///
/// Succeeds only if nobody else changed the control state since
/// `expected_version` was read. Returns whether the write happened.
pub async fn update_control(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    expected_version: i64,
    control: &ConversationControl,
) -> Result<bool, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    let state = control.state.to_string();
    let bot_enabled = control.bot_enabled();
    let pinned = control.pinned();
    let pin_reason = control.pin.as_ref().map(|p| p.reason.clone());
    let pinned_at = control.pin.as_ref().map(|p| to_ms(p.pinned_at));
    let assigned = control.assigned_admin.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET
                    state = ?3, bot_enabled = ?4, pinned = ?5, pin_reason = ?6, pinned_at = ?7,
                    assigned_admin = ?8, control_version = control_version + 1
                 WHERE tenant_id = ?1 AND user_id = ?2 AND control_version = ?9",
                params![
                    tenant_id,
                    user_id,
                    state,
                    bot_enabled,
                    pinned,
                    pin_reason,
                    pinned_at,
                    assigned,
                    expected_version
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Resets the unread counter.
pub async fn mark_read(db: &Database, tenant_id: &str, user_id: &str) -> Result<bool, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET unread_count = 0 WHERE tenant_id = ?1 AND user_id = ?2",
                params![tenant_id, user_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes a conversation and everything keyed to it. Admin action only.
pub async fn delete(db: &Database, tenant_id: &str, user_id: &str) -> Result<bool, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for table in ["messages", "followups", "crm_profiles"] {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE tenant_id = ?1 AND user_id = ?2"),
                    params![tenant_id, user_id],
                )?;
            }
            let changed = tx.execute(
                "DELETE FROM conversations WHERE tenant_id = ?1 AND user_id = ?2",
                params![tenant_id, user_id],
            )?;
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::state::{BotState, ControlEvent};

    fn profile(name: Option<&str>) -> UserProfile {
        UserProfile {
            display_name: name.map(str::to_string),
            picture_url: None,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_single_record_and_merges_names() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        let first = get_or_create(&db, "t", "u", ChannelKind::Line, &profile(Some("Ann")), now)
            .await
            .unwrap();
        assert_eq!(first.display_name.as_deref(), Some("Ann"));
        assert!(first.control.bot_enabled());

        let blank = get_or_create(&db, "t", "u", ChannelKind::Line, &profile(Some("  ")), now)
            .await
            .unwrap();
        assert_eq!(blank.display_name.as_deref(), Some("Ann"));

        let renamed = get_or_create(&db, "t", "u", ChannelKind::Line, &profile(Some("Annie")), now)
            .await
            .unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Annie"));

        let all = list(&db, "t", &ConversationFilter { limit: 10, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn control_update_is_compare_and_set() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        let conv = get_or_create(&db, "t", "u", ChannelKind::Messenger, &profile(None), now)
            .await
            .unwrap();
        let escalated = conv
            .control
            .apply(&ControlEvent::Escalate { reason: "staff".into() }, now)
            .unwrap();

        assert!(update_control(&db, "t", "u", conv.control_version, &escalated).await.unwrap());
        // Stale version loses.
        assert!(!update_control(&db, "t", "u", conv.control_version, &conv.control).await.unwrap());

        let stored = get(&db, "t", "u").await.unwrap().unwrap();
        assert_eq!(stored.control.state, BotState::Escalated);
        assert_eq!(stored.control.pin_reason(), Some("staff"));
        assert_eq!(stored.control_version, conv.control_version + 1);

        let pinned = list(
            &db,
            "t",
            &ConversationFilter {
                pinned: Some(true),
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pinned.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_conversation() {
        let db = Database::open_in_memory().await.unwrap();
        get_or_create(&db, "t", "u", ChannelKind::Line, &profile(None), Utc::now())
            .await
            .unwrap();
        assert!(delete(&db, "t", "u").await.unwrap());
        assert!(get(&db, "t", "u").await.unwrap().is_none());
        assert!(!delete(&db, "t", "u").await.unwrap());
    }
}
