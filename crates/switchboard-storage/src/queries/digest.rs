// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily digest: computed from the store, cached as a JSON payload.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{OptionalExtension, params};
use switchboard_core::SwitchboardError;
use switchboard_core::records::{AdminAction, DailyDigest, MessageRole};

use crate::database::{Database, map_tr_err};
use crate::rows::to_ms;

const TOP_MISSES: i64 = 5;

/// UTC bounds `[start, end)` of `date` in epoch milliseconds.
fn day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + chrono::Duration::days(1);
    (to_ms(start), to_ms(end))
}

/// Aggregates one UTC day for a tenant. Does not touch the cache.
pub async fn compute(
    db: &Database,
    tenant_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DailyDigest, SwitchboardError> {
    let tenant = tenant_id.to_string();
    let (start, end) = day_bounds(date);
    let day = date.to_string();

    db.connection()
        .call(move |conn| {
            let count = |sql: &str, p: &[&dyn rusqlite::ToSql]| -> rusqlite::Result<i64> {
                conn.query_row(sql, p, |row| row.get(0))
            };

            let new_conversations = count(
                "SELECT COUNT(*) FROM conversations WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![tenant, start, end],
            )?;
            let active_conversations = count(
                "SELECT COUNT(DISTINCT user_id) FROM messages WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![tenant, start, end],
            )?;
            let by_role = |role: MessageRole| {
                count(
                    "SELECT COUNT(*) FROM messages WHERE tenant_id = ?1 AND role = ?2 AND created_at >= ?3 AND created_at < ?4",
                    params![tenant, role.to_string(), start, end],
                )
            };
            let customer_messages = by_role(MessageRole::Customer)?;
            let bot_messages = by_role(MessageRole::Bot)?;
            let admin_messages = by_role(MessageRole::Admin)?;

            let by_action = |action: AdminAction| {
                count(
                    "SELECT COUNT(*) FROM activity_log WHERE tenant_id = ?1 AND action = ?2 AND created_at >= ?3 AND created_at < ?4",
                    params![tenant, action.to_string(), start, end],
                )
            };
            let escalations = by_action(AdminAction::EscalationNotified)?;
            let auto_pins = by_action(AdminAction::AutoPinned)?;

            let mut stmt = conn.prepare(
                "SELECT normalized, count FROM misses
                 WHERE tenant_id = ?1 AND last_seen_at >= ?2 AND last_seen_at < ?3
                 ORDER BY count DESC, normalized ASC LIMIT ?4",
            )?;
            let top_misses = stmt
                .query_map(params![tenant, start, end, TOP_MISSES], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let cost_usd: f64 = conn.query_row(
                "SELECT COALESCE(SUM(cost_usd), 0.0) FROM usage_daily WHERE tenant_id = ?1 AND date = ?2",
                params![tenant, day],
                |row| row.get(0),
            )?;

            Ok(DailyDigest {
                tenant_id: tenant,
                date,
                new_conversations,
                active_conversations,
                customer_messages,
                bot_messages,
                admin_messages,
                escalations,
                auto_pins,
                top_misses,
                cost_usd,
                generated_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn cached(
    db: &Database,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<Option<DailyDigest>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let day = date.to_string();
    let payload: Option<String> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT payload FROM daily_digests WHERE tenant_id = ?1 AND date = ?2",
                params![tenant_id, day],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    payload
        .map(|raw| serde_json::from_str(&raw).map_err(SwitchboardError::storage))
        .transpose()
}

pub async fn store(db: &Database, digest: &DailyDigest) -> Result<(), SwitchboardError> {
    let payload = serde_json::to_string(digest).map_err(SwitchboardError::storage)?;
    let tenant_id = digest.tenant_id.clone();
    let day = digest.date.to_string();
    let generated_at = to_ms(digest.generated_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO daily_digests (tenant_id, date, payload, generated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tenant_id, date) DO UPDATE SET
                    payload = excluded.payload, generated_at = excluded.generated_at",
                params![tenant_id, day, payload, generated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Cached digest, or a freshly computed one (which is then cached).
pub async fn get_or_compute(
    db: &Database,
    tenant_id: &str,
    date: NaiveDate,
    refresh: bool,
    now: DateTime<Utc>,
) -> Result<DailyDigest, SwitchboardError> {
    if !refresh && let Some(digest) = cached(db, tenant_id, date).await? {
        return Ok(digest);
    }
    let digest = compute(db, tenant_id, date, now).await?;
    store(db, &digest).await?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::records::{NewActivity, NewMessage, SYSTEM_USER};
    use switchboard_core::{ChannelKind, UserProfile};

    use crate::queries::{activity, conversations, messages};

    #[tokio::test]
    async fn digest_counts_one_day_and_caches() {
        let db = Database::open_in_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let noon = date.and_hms_opt(12, 0, 0).unwrap().and_utc();
        let yesterday = noon - chrono::Duration::days(1);

        conversations::get_or_create(&db, "t", "u1", ChannelKind::Line, &UserProfile::default(), noon)
            .await
            .unwrap();
        conversations::get_or_create(&db, "t", "u0", ChannelKind::Line, &UserProfile::default(), yesterday)
            .await
            .unwrap();
        for (user, role, at) in [
            ("u1", MessageRole::Customer, noon),
            ("u1", MessageRole::Bot, noon),
            ("u0", MessageRole::Customer, noon),
            ("u0", MessageRole::Admin, noon),
            ("u0", MessageRole::Customer, yesterday),
        ] {
            messages::append(&db, "t", user, &NewMessage::text(role, "x", at), 500)
                .await
                .unwrap();
        }
        activity::append(
            &db,
            "t",
            &NewActivity {
                username: SYSTEM_USER.into(),
                action: AdminAction::EscalationNotified,
                target_user: Some("u0".into()),
                detail: None,
                created_at: noon,
            },
        )
        .await
        .unwrap();

        let digest = get_or_compute(&db, "t", date, false, noon).await.unwrap();
        assert_eq!(digest.new_conversations, 1);
        assert_eq!(digest.active_conversations, 2);
        assert_eq!(digest.customer_messages, 2);
        assert_eq!(digest.bot_messages, 1);
        assert_eq!(digest.admin_messages, 1);
        assert_eq!(digest.escalations, 1);
        assert_eq!(digest.auto_pins, 0);

        // New traffic does not show up until a refresh.
        messages::append(&db, "t", "u1", &NewMessage::text(MessageRole::Customer, "y", noon), 500)
            .await
            .unwrap();
        let cached = get_or_compute(&db, "t", date, false, noon).await.unwrap();
        assert_eq!(cached.customer_messages, 2);
        let fresh = get_or_compute(&db, "t", date, true, noon).await.unwrap();
        assert_eq!(fresh.customer_messages, 3);
    }
}
