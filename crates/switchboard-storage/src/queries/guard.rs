// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplicate suppression and fixed-window rate limiting.
//!
//! Both checks are a single upsert statement, so concurrent invocations
//! racing on the same key see a consistent answer without locks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::params;
use switchboard_core::SwitchboardError;

use crate::database::{Database, map_tr_err};
use crate::rows::to_ms;

/// Outcome of an idempotency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// First sighting within the TTL; the caller owns this event.
    Fresh,
    /// Already claimed by an earlier delivery.
    Duplicate,
}

/// Claims `key` for `ttl`. Set-if-not-exists, where an expired claim counts
/// as absent.
pub async fn claim_event(
    db: &Database,
    key: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Idempotency, SwitchboardError> {
    let key = key.to_string();
    let now_ms = to_ms(now);
    let expires_at = now_ms + ttl.as_millis() as i64;
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO idempotency_keys (key, expires_at) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET expires_at = excluded.expires_at
                 WHERE idempotency_keys.expires_at <= ?3",
                params![key, expires_at, now_ms],
            )?;
            Ok(if changed == 1 {
                Idempotency::Fresh
            } else {
                Idempotency::Duplicate
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Result of counting one event against a user's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Events counted in the current window, including this one.
    pub count: u32,
    pub limited: bool,
}

/// Counts an event for (tenant, user) in the fixed window containing `now`.
pub async fn hit_rate_limit(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    limit: u32,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<RateDecision, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    let window_ms = (window.as_millis() as i64).max(1);
    let now_ms = to_ms(now);
    let window_start = now_ms - now_ms.rem_euclid(window_ms);
    let expires_at = window_start + window_ms;

    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO rate_counters (tenant_id, user_id, window_start, count, expires_at)
                 VALUES (?1, ?2, ?3, 1, ?4)
                 ON CONFLICT(tenant_id, user_id, window_start) DO UPDATE SET count = count + 1
                 RETURNING count",
                params![tenant_id, user_id, window_start, expires_at],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;

    let count = count.clamp(0, u32::MAX as i64) as u32;
    Ok(RateDecision {
        count,
        limited: count > limit,
    })
}

/// Deletes expired idempotency keys and rate counters. Returns rows removed.
pub async fn purge_expired(db: &Database, now: DateTime<Utc>) -> Result<usize, SwitchboardError> {
    let now_ms = to_ms(now);
    db.connection()
        .call(move |conn| {
            let keys = conn.execute(
                "DELETE FROM idempotency_keys WHERE expires_at <= ?1",
                params![now_ms],
            )?;
            let counters = conn.execute(
                "DELETE FROM rate_counters WHERE expires_at <= ?1",
                params![now_ms],
            )?;
            Ok(keys + counters)
        })
        .await
        .map_err(map_tr_err)
}
