// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage ledger for AI calls.
//!
//! Each call, successful or failed, is written to a bounded per-tenant
//! recent-call log and folded into per-(date, model) and all-time
//! aggregates in the same transaction. Aggregates therefore always equal the
//! sum of everything ever recorded, even after the recent log is trimmed.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use switchboard_core::records::{DailyAggregate, UsageEntry, UsageTotals};
use switchboard_core::{SwitchboardError, TokenUsage};
use switchboard_storage::rows::{time, to_ms};
use switchboard_storage::{Database, map_tr_err};
use tracing::info;

use crate::pricing::{calculate_cost, get_pricing};

/// Where an AI call was made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallSite {
    /// Fallback chain answering a customer.
    Fallback,
    /// Correction analysis.
    Learning,
    /// CRM profile extraction.
    Crm,
    /// Follow-up analysis.
    Followup,
}

/// Persistent usage ledger on the shared store.
#[derive(Clone)]
pub struct UsageLedger {
    db: Database,
    recent_cap: u32,
}

impl UsageLedger {
    pub fn new(db: Database, recent_cap: u32) -> Self {
        Self {
            db,
            recent_cap: recent_cap.max(1),
        }
    }

    /// Prices and records one call.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_call(
        &self,
        tenant_id: &str,
        provider: &str,
        model: &str,
        call_site: CallSite,
        usage: TokenUsage,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<UsageEntry, SwitchboardError> {
        let entry = UsageEntry {
            tenant_id: tenant_id.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            call_site: call_site.to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost_usd: calculate_cost(&usage, &get_pricing(model)),
            success,
            created_at: now,
        };
        self.record(&entry).await?;
        Ok(entry)
    }

    /// Records an already-priced entry.
    pub async fn record(&self, entry: &UsageEntry) -> Result<(), SwitchboardError> {
        let e = entry.clone();
        let date = e.created_at.date_naive().to_string();
        let failed = i64::from(!e.success);
        let cap = i64::from(self.recent_cap);

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO usage_calls (tenant_id, provider, model, call_site, prompt_tokens, \
                     completion_tokens, cost_usd, success, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        e.tenant_id,
                        e.provider,
                        e.model,
                        e.call_site,
                        e.prompt_tokens,
                        e.completion_tokens,
                        e.cost_usd,
                        e.success,
                        to_ms(e.created_at),
                    ],
                )?;
                tx.execute(
                    "DELETE FROM usage_calls WHERE tenant_id = ?1 AND id <= (
                        SELECT id FROM usage_calls WHERE tenant_id = ?1
                        ORDER BY id DESC LIMIT 1 OFFSET ?2
                     )",
                    params![e.tenant_id, cap],
                )?;
                tx.execute(
                    "INSERT INTO usage_daily (tenant_id, date, model, calls, failed_calls, \
                     prompt_tokens, completion_tokens, cost_usd) \
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7) \
                     ON CONFLICT(tenant_id, date, model) DO UPDATE SET \
                        calls = calls + 1, \
                        failed_calls = failed_calls + excluded.failed_calls, \
                        prompt_tokens = prompt_tokens + excluded.prompt_tokens, \
                        completion_tokens = completion_tokens + excluded.completion_tokens, \
                        cost_usd = cost_usd + excluded.cost_usd",
                    params![
                        e.tenant_id,
                        date,
                        e.model,
                        failed,
                        e.prompt_tokens,
                        e.completion_tokens,
                        e.cost_usd
                    ],
                )?;
                tx.execute(
                    "INSERT INTO usage_totals (tenant_id, calls, failed_calls, prompt_tokens, \
                     completion_tokens, cost_usd) VALUES (?1, 1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(tenant_id) DO UPDATE SET \
                        calls = calls + 1, \
                        failed_calls = failed_calls + excluded.failed_calls, \
                        prompt_tokens = prompt_tokens + excluded.prompt_tokens, \
                        completion_tokens = completion_tokens + excluded.completion_tokens, \
                        cost_usd = cost_usd + excluded.cost_usd",
                    params![
                        e.tenant_id,
                        failed,
                        e.prompt_tokens,
                        e.completion_tokens,
                        e.cost_usd
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        info!(
            tenant_id = %entry.tenant_id,
            provider = %entry.provider,
            model = %entry.model,
            call_site = %entry.call_site,
            prompt_tokens = entry.prompt_tokens,
            completion_tokens = entry.completion_tokens,
            cost_usd = entry.cost_usd,
            success = entry.success,
            "usage recorded"
        );
        Ok(())
    }

    /// Per-(date, model) aggregates for dates in `[from, to]`, oldest first.
    pub async fn daily(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAggregate>, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let (from, to) = (from.to_string(), to.to_string());
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT tenant_id, date, model, calls, prompt_tokens, completion_tokens, cost_usd \
                     FROM usage_daily WHERE tenant_id = ?1 AND date >= ?2 AND date <= ?3 \
                     ORDER BY date ASC, model ASC",
                )?;
                let rows = stmt
                    .query_map(params![tenant_id, from, to], |row| {
                        let date: String = row.get(1)?;
                        Ok(DailyAggregate {
                            tenant_id: row.get(0)?,
                            date: date.parse().map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(
                                    1,
                                    rusqlite::types::Type::Text,
                                    Box::new(e),
                                )
                            })?,
                            model: row.get(2)?,
                            calls: row.get(3)?,
                            prompt_tokens: row.get(4)?,
                            completion_tokens: row.get(5)?,
                            cost_usd: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// All-time totals; zero for a tenant with no calls.
    pub async fn totals(&self, tenant_id: &str) -> Result<UsageTotals, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT calls, failed_calls, prompt_tokens, completion_tokens, cost_usd \
                     FROM usage_totals WHERE tenant_id = ?1",
                )?;
                let mut rows = stmt.query(params![tenant_id])?;
                match rows.next()? {
                    Some(row) => Ok(UsageTotals {
                        calls: row.get(0)?,
                        failed_calls: row.get(1)?,
                        prompt_tokens: row.get(2)?,
                        completion_tokens: row.get(3)?,
                        cost_usd: row.get(4)?,
                    }),
                    None => Ok(UsageTotals::default()),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    /// Most recent calls, newest first.
    pub async fn recent(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<UsageEntry>, SwitchboardError> {
        let tenant_id = tenant_id.to_string();
        let limit = i64::from(limit);
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT tenant_id, provider, model, call_site, prompt_tokens, completion_tokens, \
                     cost_usd, success, created_at FROM usage_calls \
                     WHERE tenant_id = ?1 ORDER BY id DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![tenant_id, limit], |row| {
                        Ok(UsageEntry {
                            tenant_id: row.get(0)?,
                            provider: row.get(1)?,
                            model: row.get(2)?,
                            call_site: row.get(3)?,
                            prompt_tokens: row.get(4)?,
                            completion_tokens: row.get(5)?,
                            cost_usd: row.get(6)?,
                            success: row.get(7)?,
                            created_at: time(row, 8)?,
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

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
        }
    }

    async fn ledger(cap: u32) -> UsageLedger {
        UsageLedger::new(Database::open_in_memory().await.unwrap(), cap)
    }

    #[tokio::test]
    async fn aggregates_survive_recent_log_trim() {
        let ledger = ledger(3).await;
        let now = Utc::now();
        for i in 0..10 {
            ledger
                .record_call("t", "claude", "claude-sonnet-4", CallSite::Fallback, usage(100, 50), i % 5 != 0, now)
                .await
                .unwrap();
        }

        let recent = ledger.recent("t", 100).await.unwrap();
        assert_eq!(recent.len(), 3);

        let totals = ledger.totals("t").await.unwrap();
        assert_eq!(totals.calls, 10);
        assert_eq!(totals.failed_calls, 2);
        assert_eq!(totals.prompt_tokens, 1000);
        assert_eq!(totals.completion_tokens, 500);

        let today = now.date_naive();
        let daily = ledger.daily("t", today, today).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].calls, 10);
        assert!((daily[0].cost_usd - totals.cost_usd).abs() < 1e-9);
    }

    #[tokio::test]
    async fn daily_rows_split_by_model_and_tenant() {
        let ledger = ledger(200).await;
        let now = Utc::now();
        ledger
            .record_call("t", "claude", "claude-haiku-4-5", CallSite::Learning, usage(10, 10), true, now)
            .await
            .unwrap();
        ledger
            .record_call("t", "openai", "gpt-4o-mini", CallSite::Fallback, usage(10, 10), true, now)
            .await
            .unwrap();
        ledger
            .record_call("other", "openai", "gpt-4o-mini", CallSite::Crm, usage(10, 10), true, now)
            .await
            .unwrap();

        let today = now.date_naive();
        let daily = ledger.daily("t", today, today).await.unwrap();
        assert_eq!(
            daily.iter().map(|d| d.model.as_str()).collect::<Vec<_>>(),
            ["claude-haiku-4-5", "gpt-4o-mini"]
        );
        assert_eq!(ledger.totals("nobody").await.unwrap(), UsageTotals::default());

        let recent = ledger.recent("t", 10).await.unwrap();
        assert_eq!(recent[0].call_site, "fallback");
        assert_eq!(recent[1].call_site, "learning");
    }
}
