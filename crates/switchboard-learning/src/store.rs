// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learned intents, knowledge, and scripts, plus the corrections they came from.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::records::{Correction, LearnedData, LearnedEntry, LearnedKind};
use switchboard_storage::rows::{list_json, parsed, string_list, time, to_ms};
use switchboard_storage::{Database, map_tr_err};
use tracing::debug;

const COLUMNS: &str = "id, tenant_id, kind, title, source_question, answer, triggers, confidence, \
     enabled, hit_count, created_at, expires_at";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LearnedEntry> {
    Ok(LearnedEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        kind: parsed(row, 2)?,
        title: row.get(3)?,
        source_question: row.get(4)?,
        answer: row.get(5)?,
        triggers: string_list(row, 6)?,
        confidence: row.get(7)?,
        enabled: row.get(8)?,
        hit_count: row.get(9)?,
        created_at: time(row, 10)?,
        expires_at: time(row, 11)?,
    })
}

/// Draft of a learned entry before it gets an id and expiry.
#[derive(Debug, Clone)]
pub struct NewLearned {
    pub kind: LearnedKind,
    pub title: String,
    pub source_question: String,
    pub answer: String,
    pub triggers: Vec<String>,
    pub confidence: f64,
}

/// Store of learned entries, TTL-bound by `ttl`.
#[derive(Clone)]
pub struct LearnedStore {
    db: Database,
    ttl: Duration,
}

impl LearnedStore {
    pub fn new(db: Database, ttl_days: u32) -> Self {
        Self {
            db,
            ttl: Duration::days(i64::from(ttl_days)),
        }
    }

    /// Persists a new entry, enabled, expiring `ttl` from `now`.
    pub async fn insert(
        &self,
        tenant_id: &str,
        draft: NewLearned,
        now: DateTime<Utc>,
    ) -> Result<LearnedEntry, SwitchboardError> {
        let entry = LearnedEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kind: draft.kind,
            title: draft.title,
            source_question: draft.source_question,
            answer: draft.answer,
            triggers: draft.triggers,
            confidence: draft.confidence.clamp(0.0, 1.0),
            enabled: true,
            hit_count: 0,
            created_at: now,
            expires_at: now + self.ttl,
        };
        let e = entry.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO learned_entries ({COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                    ),
                    params![
                        e.id,
                        e.tenant_id,
                        e.kind.to_string(),
                        e.title,
                        e.source_question,
                        e.answer,
                        list_json(&e.triggers),
                        e.confidence,
                        e.enabled,
                        e.hit_count,
                        to_ms(e.created_at),
                        to_ms(e.expires_at)
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(tenant_id, id = %entry.id, kind = %entry.kind, "learned entry stored");
        Ok(entry)
    }

    /// All unexpired entries of `kind`, newest first, enabled or not.
    pub async fn list(
        &self,
        tenant_id: &str,
        kind: LearnedKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<LearnedEntry>, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let kind = kind.to_string();
        let now = to_ms(now);
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM learned_entries
                     WHERE tenant_id = ?1 AND kind = ?2 AND expires_at > ?3
                     ORDER BY created_at DESC, id ASC"
                ))?;
                let rows = stmt
                    .query_map(params![tenant_id, kind, now], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Enabled, unexpired entries grouped by kind, for one resolver turn.
    pub async fn enabled_data(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LearnedData, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let now = to_ms(now);
        let entries = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM learned_entries
                     WHERE tenant_id = ?1 AND enabled = 1 AND expires_at > ?2
                     ORDER BY created_at ASC"
                ))?;
                let rows = stmt
                    .query_map(params![tenant_id, now], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        let mut data = LearnedData::default();
        for entry in entries {
            data.push(entry);
        }
        Ok(data)
    }

    /// Returns false when no such entry exists.
    pub async fn set_enabled(
        &self,
        tenant_id: &str,
        kind: LearnedKind,
        id: &str,
        enabled: bool,
    ) -> Result<bool, SwitchboardError> {
        let (tenant_id, kind, id) = (tenant_id.to_string(), kind.to_string(), id.to_string());
        self.db
            .connection()
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE learned_entries SET enabled = ?4 WHERE tenant_id = ?1 AND kind = ?2 AND id = ?3",
                    params![tenant_id, kind, id, enabled],
                )?;
                Ok(n == 1)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn delete(
        &self,
        tenant_id: &str,
        kind: LearnedKind,
        id: &str,
    ) -> Result<bool, SwitchboardError> {
        let (tenant_id, kind, id) = (tenant_id.to_string(), kind.to_string(), id.to_string());
        self.db
            .connection()
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM learned_entries WHERE tenant_id = ?1 AND kind = ?2 AND id = ?3",
                    params![tenant_id, kind, id],
                )?;
                Ok(n == 1)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Atomically bumps the hit counter of each listed entry.
    pub async fn record_hits(&self, tenant_id: &str, ids: &[String]) -> Result<usize, SwitchboardError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let tenant_id = tenant_id.to_string();
        let ids = ids.to_vec();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "UPDATE learned_entries SET hit_count = hit_count + 1 WHERE tenant_id = ?1 AND id = ?2",
                )?;
                let mut touched = 0;
                for id in &ids {
                    touched += stmt.execute(params![tenant_id, id])?;
                }
                Ok(touched)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Stores a correction and returns its id.
    pub async fn record_correction(&self, correction: &Correction) -> Result<i64, SwitchboardError> {
        let c = correction.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO corrections (tenant_id, user_id, admin, question, bot_answer, admin_answer, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        c.tenant_id,
                        c.user_id,
                        c.admin,
                        c.question,
                        c.bot_answer,
                        c.admin_answer,
                        to_ms(c.created_at)
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Stamps what the analysis made of a correction.
    pub async fn set_correction_outcome(&self, id: i64, outcome: &str) -> Result<(), SwitchboardError> {
        let outcome = outcome.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE corrections SET outcome = ?2 WHERE id = ?1",
                    params![id, outcome],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn correction_outcome(&self, id: i64) -> Result<Option<String>, SwitchboardError> {
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT outcome FROM corrections WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Deletes expired learned entries, misses, and Q&A log rows.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, SwitchboardError> {
        let now = to_ms(now);
        let purged = self
            .db
            .connection()
            .call(move |conn| {
                let mut total = 0;
                for table in ["learned_entries", "misses", "qa_log"] {
                    total += conn.execute(
                        &format!("DELETE FROM {table} WHERE expires_at <= ?1"),
                        params![now],
                    )?;
                }
                Ok(total)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(purged, "expired learning rows purged");
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(kind: LearnedKind, title: &str) -> NewLearned {
        NewLearned {
            kind,
            title: title.into(),
            source_question: "do you ship to Chiang Mai?".into(),
            answer: "Yes, 2-3 days.".into(),
            triggers: vec!["ship".into(), "chiang mai".into()],
            confidence: 0.8,
        }
    }

    async fn store() -> LearnedStore {
        LearnedStore::new(Database::open_in_memory().await.unwrap(), 180)
    }

    #[tokio::test]
    async fn enabled_data_groups_and_honours_toggle() {
        let store = store().await;
        let now = Utc::now();
        let intent = store.insert("t", draft(LearnedKind::Intent, "shipping"), now).await.unwrap();
        store.insert("t", draft(LearnedKind::Knowledge, "areas"), now).await.unwrap();
        store.insert("other", draft(LearnedKind::Script, "x"), now).await.unwrap();

        let data = store.enabled_data("t", now).await.unwrap();
        assert_eq!(data.intents.len(), 1);
        assert_eq!(data.knowledge.len(), 1);
        assert!(data.scripts.is_empty());

        assert!(store.set_enabled("t", LearnedKind::Intent, &intent.id, false).await.unwrap());
        assert!(!store.set_enabled("t", LearnedKind::Knowledge, &intent.id, false).await.unwrap());
        let data = store.enabled_data("t", now).await.unwrap();
        assert!(data.intents.is_empty());
        // Disabled entries stay listed for admins.
        assert_eq!(store.list("t", LearnedKind::Intent, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hits_accumulate_and_expiry_purges() {
        let store = store().await;
        let now = Utc::now();
        let entry = store.insert("t", draft(LearnedKind::Intent, "shipping"), now).await.unwrap();
        let ids = vec![entry.id.clone()];
        store.record_hits("t", &ids).await.unwrap();
        store.record_hits("t", &ids).await.unwrap();
        let listed = store.list("t", LearnedKind::Intent, now).await.unwrap();
        assert_eq!(listed[0].hit_count, 2);

        let later = now + Duration::days(181);
        assert!(store.enabled_data("t", later).await.unwrap().is_empty());
        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert!(!store.delete("t", LearnedKind::Intent, &entry.id).await.unwrap());
    }
}
