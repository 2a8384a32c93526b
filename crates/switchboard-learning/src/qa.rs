// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded log of bot replies awaiting review.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use switchboard_core::SwitchboardError;
use switchboard_core::records::{QaLogEntry, ReviewStatus};
use switchboard_storage::rows::{parsed, time, to_ms};
use switchboard_storage::{Database, map_tr_err};

/// Per-tenant ring log of the most recent `cap` bot replies.
#[derive(Clone)]
pub struct QaLog {
    db: Database,
    cap: u32,
    ttl: Duration,
}

impl QaLog {
    pub fn new(db: Database, cap: u32, ttl_days: u32) -> Self {
        Self {
            db,
            cap: cap.max(1),
            ttl: Duration::days(i64::from(ttl_days)),
        }
    }

    /// Logs a reply as pending review, trimming the oldest beyond the cap.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        tenant_id: &str,
        user_id: &str,
        question: &str,
        answer: &str,
        layer: i64,
        layer_name: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, SwitchboardError> {
        let (tenant_id, user_id) = (tenant_id.to_string(), user_id.to_string());
        let (question, answer, layer_name) =
            (question.to_string(), answer.to_string(), layer_name.to_string());
        let cap = i64::from(self.cap);
        let (created, expires) = (to_ms(now), to_ms(now + self.ttl));
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO qa_log (tenant_id, user_id, question, answer, layer, layer_name, review_status, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        tenant_id,
                        user_id,
                        question,
                        answer,
                        layer,
                        layer_name,
                        ReviewStatus::Pending.to_string(),
                        created,
                        expires
                    ],
                )?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "DELETE FROM qa_log WHERE tenant_id = ?1 AND id <= (
                        SELECT id FROM qa_log WHERE tenant_id = ?1 ORDER BY id DESC LIMIT 1 OFFSET ?2
                     )",
                    params![tenant_id, cap],
                )?;
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Newest first, optionally filtered by status.
    pub async fn list(
        &self,
        tenant_id: &str,
        status: Option<ReviewStatus>,
        limit: u32,
    ) -> Result<Vec<QaLogEntry>, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let status = status.map(|s| s.to_string());
        let limit = i64::from(limit);
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, tenant_id, user_id, question, answer, layer, layer_name, review_status, created_at
                     FROM qa_log WHERE tenant_id = ?1 AND (?2 IS NULL OR review_status = ?2)
                     ORDER BY id DESC LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![tenant_id, status, limit], |row| {
                        Ok(QaLogEntry {
                            id: row.get(0)?,
                            tenant_id: row.get(1)?,
                            user_id: row.get(2)?,
                            question: row.get(3)?,
                            answer: row.get(4)?,
                            layer: row.get(5)?,
                            layer_name: row.get(6)?,
                            review_status: parsed(row, 7)?,
                            created_at: time(row, 8)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Returns false when the entry does not exist (or was trimmed).
    pub async fn set_review(
        &self,
        tenant_id: &str,
        id: i64,
        status: ReviewStatus,
    ) -> Result<bool, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let status = status.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE qa_log SET review_status = ?3 WHERE tenant_id = ?1 AND id = ?2",
                    params![tenant_id, id, status],
                )?;
                Ok(n == 1)
            })
            .await
            .map_err(map_tr_err)
    }
}
