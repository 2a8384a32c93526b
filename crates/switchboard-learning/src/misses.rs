// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miss tracker: counts questions the bot could not answer.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use switchboard_core::SwitchboardError;
use switchboard_core::records::{MissEntry, normalize_question};
use switchboard_storage::rows::{string_list, time, to_ms};
use switchboard_storage::{Database, map_tr_err};

#[derive(Clone)]
pub struct MissTracker {
    db: Database,
    ttl: Duration,
    example_cap: u32,
}

impl MissTracker {
    pub fn new(db: Database, ttl_days: u32, example_cap: u32) -> Self {
        Self {
            db,
            ttl: Duration::days(i64::from(ttl_days)),
            example_cap,
        }
    }

    /// Counts one miss. The raw text is kept as an example while fewer than
    /// `example_cap` distinct examples are stored. Blank questions are ignored.
    pub async fn record(
        &self,
        tenant_id: &str,
        question: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        let normalized = normalize_question(question);
        if normalized.is_empty() {
            return Ok(());
        }
        let tenant_id = tenant_id.to_string();
        let raw = question.trim().to_string();
        let cap = i64::from(self.example_cap);
        let seen = to_ms(now);
        let expires = to_ms(now + self.ttl);
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO misses (tenant_id, normalized, count, examples, last_seen_at, expires_at)
                     VALUES (?1, ?2, 1, CASE WHEN ?4 > 0 THEN json_array(?3) ELSE '[]' END, ?5, ?6)
                     ON CONFLICT(tenant_id, normalized) DO UPDATE SET
                        count = count + 1,
                        last_seen_at = excluded.last_seen_at,
                        expires_at = excluded.expires_at,
                        examples = CASE
                            WHEN json_array_length(examples) < ?4
                             AND NOT EXISTS (SELECT 1 FROM json_each(misses.examples) WHERE value = ?3)
                            THEN json_insert(examples, '$[#]', ?3)
                            ELSE examples
                        END",
                    params![tenant_id, normalized, raw, cap, seen, expires],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Most frequent unexpired misses first.
    pub async fn top(
        &self,
        tenant_id: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<MissEntry>, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let limit = i64::from(limit);
        let now = to_ms(now);
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT tenant_id, normalized, count, examples, last_seen_at FROM misses
                     WHERE tenant_id = ?1 AND expires_at > ?2
                     ORDER BY count DESC, last_seen_at DESC LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![tenant_id, now, limit], |row| {
                        Ok(MissEntry {
                            tenant_id: row.get(0)?,
                            normalized: row.get(1)?,
                            count: row.get(2)?,
                            examples: string_list(row, 3)?,
                            last_seen_at: time(row, 4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn misses_aggregate_by_normalized_text() {
        let db = Database::open_in_memory().await.unwrap();
        let tracker = MissTracker::new(db, 180, 2);
        let now = Utc::now();
        for q in ["Do you have RED shoes?", "do you have red shoes?", "  do you  have red shoes? ", "open sunday?"] {
            tracker.record("t", q, now).await.unwrap();
        }
        tracker.record("t", "   ", now).await.unwrap();

        let top = tracker.top("t", 10, now).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].normalized, "do you have red shoes?");
        assert_eq!(top[0].count, 3);
        assert_eq!(
            top[0].examples,
            ["Do you have RED shoes?", "do you have red shoes?"]
        );
        assert_eq!(top[1].count, 1);
    }
}
