// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only admin activity log and per-admin statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::records::{ActivityEntry, AdminAction, AdminStats, NewActivity};

use crate::database::{Database, map_tr_err};
use crate::rows::{parsed, time, to_ms};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    Ok(ActivityEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        username: row.get(2)?,
        action: parsed(row, 3)?,
        target_user: row.get(4)?,
        detail: row.get(5)?,
        created_at: time(row, 6)?,
    })
}

pub async fn append(
    db: &Database,
    tenant_id: &str,
    entry: &NewActivity,
) -> Result<i64, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let e = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO activity_log (tenant_id, username, action, target_user, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tenant_id,
                    e.username,
                    e.action.to_string(),
                    e.target_user,
                    e.detail,
                    to_ms(e.created_at)
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Filter for [`query`]. Bounds are inclusive `from`, exclusive `to`.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub username: Option<String>,
    pub action: Option<AdminAction>,
    pub limit: u32,
    pub offset: u32,
}

/// Entries matching `filter`, newest first.
pub async fn query(
    db: &Database,
    tenant_id: &str,
    filter: &ActivityFilter,
) -> Result<Vec<ActivityEntry>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let from = filter.from.map(to_ms).unwrap_or(i64::MIN);
    let to = filter.to.map(to_ms).unwrap_or(i64::MAX);
    let username = filter.username.clone();
    let action = filter.action.map(|a| a.to_string());
    let limit = i64::from(if filter.limit == 0 { 100 } else { filter.limit });
    let offset = filter.offset as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, username, action, target_user, detail, created_at
                 FROM activity_log
                 WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3
                   AND (?4 IS NULL OR username = ?4)
                   AND (?5 IS NULL OR action = ?5)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?6 OFFSET ?7",
            )?;
            let rows = stmt
                .query_map(
                    params![tenant_id, from, to, username, action, limit, offset],
                    row_to_entry,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Per-admin action counts in `[from, to)`, excluding engine-written entries.
pub async fn admin_stats(
    db: &Database,
    tenant_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<AdminStats>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let (from, to) = (to_ms(from), to_ms(to));
    let rows: Vec<(String, String, i64)> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT username, action, COUNT(*) FROM activity_log
                 WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3 AND username != ?4
                 GROUP BY username, action
                 ORDER BY username, action",
            )?;
            let rows = stmt
                .query_map(
                    params![tenant_id, from, to, switchboard_core::records::SYSTEM_USER],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    let mut by_user: BTreeMap<String, AdminStats> = BTreeMap::new();
    for (username, action, count) in rows {
        let Ok(action) = action.parse::<AdminAction>() else {
            continue;
        };
        let stats = by_user.entry(username.clone()).or_insert_with(|| AdminStats {
            username,
            ..Default::default()
        });
        stats.total += count;
        stats.by_action.push((action, count));
    }
    Ok(by_user.into_values().collect())
}

/// Number of `action` entries in `[from, to)`.
pub async fn count_actions(
    db: &Database,
    tenant_id: &str,
    action: AdminAction,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<i64, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let action = action.to_string();
    let (from, to) = (to_ms(from), to_ms(to));
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM activity_log
                 WHERE tenant_id = ?1 AND action = ?2 AND created_at >= ?3 AND created_at < ?4",
                params![tenant_id, action, from, to],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use switchboard_core::records::SYSTEM_USER;

    fn entry(username: &str, action: AdminAction, at: DateTime<Utc>) -> NewActivity {
        NewActivity {
            username: username.into(),
            action,
            target_user: Some("u1".into()),
            detail: None,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn query_filters_and_orders_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let base = Utc::now() - Duration::hours(2);
        append(&db, "t", &entry("alice", AdminAction::Pin, base)).await.unwrap();
        append(&db, "t", &entry("bob", AdminAction::SendMessage, base + Duration::minutes(1)))
            .await
            .unwrap();
        append(&db, "t", &entry("alice", AdminAction::Unpin, base + Duration::minutes(2)))
            .await
            .unwrap();
        append(&db, "other", &entry("alice", AdminAction::Pin, base)).await.unwrap();

        let all = query(&db, "t", &ActivityFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, AdminAction::Unpin);

        let alice = query(
            &db,
            "t",
            &ActivityFilter {
                username: Some("alice".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(alice.len(), 2);

        let windowed = query(
            &db,
            "t",
            &ActivityFilter {
                from: Some(base + Duration::seconds(30)),
                to: Some(base + Duration::seconds(90)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].username, "bob");
    }

    #[tokio::test]
    async fn stats_group_by_admin_and_skip_system() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        for action in [AdminAction::Pin, AdminAction::Pin, AdminAction::SendMessage] {
            append(&db, "t", &entry("alice", action, now)).await.unwrap();
        }
        append(&db, "t", &entry(SYSTEM_USER, AdminAction::EscalationNotified, now))
            .await
            .unwrap();

        let stats = admin_stats(&db, "t", now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total, 3);
        assert!(stats[0].by_action.contains(&(AdminAction::Pin, 2)));

        let escalations = count_actions(
            &db,
            "t",
            AdminAction::EscalationNotified,
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
        .await
        .unwrap();
        assert_eq!(escalations, 1);
    }
}
