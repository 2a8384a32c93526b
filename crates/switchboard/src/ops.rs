// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot maintenance commands: `config check`, `digest`, `followups`,
//! and `purge`.

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use switchboard_config::SwitchboardConfig;
use switchboard_core::records::DailyDigest;
use switchboard_core::{ChannelKind, SwitchboardError};
use switchboard_orchestrator::{KeywordResolver, Orchestrator, PurgeReport};
use switchboard_storage::Database;

use crate::wiring::build_tenants;

async fn open(config: &SwitchboardConfig) -> Result<(Orchestrator, Database), SwitchboardError> {
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    let orchestrator = Orchestrator::new(config, db.clone(), Arc::new(KeywordResolver::default()));
    Ok((orchestrator, db))
}

/// Summary lines printed by `config check`, one per tenant.
pub fn describe_tenants(config: &SwitchboardConfig) -> Vec<String> {
    config
        .tenants
        .iter()
        .map(|tenant| {
            let mut channels = Vec::new();
            if tenant.line.is_some() {
                channels.push(ChannelKind::Line.to_string());
            }
            if tenant.messenger.is_some() {
                channels.push(ChannelKind::Messenger.to_string());
            }
            let chain = match &tenant.provider_order {
                Some(order) => order.join(" -> "),
                None => config
                    .fallback
                    .providers
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> "),
            };
            format!(
                "{}: channels [{}], chain [{}], bot {}",
                tenant.id,
                channels.join(", "),
                chain,
                if tenant.bot_enabled { "on" } else { "off" }
            )
        })
        .collect()
}

/// Validates adapter construction on top of the already-validated config.
pub fn run_config_check(config: &SwitchboardConfig, plain: bool) -> Result<(), SwitchboardError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    build_tenants(config)?;

    let header = "configuration OK";
    if use_color {
        use colored::Colorize;
        println!("  {} {}", "✓".green(), header.green());
    } else {
        println!("  [OK] {header}");
    }
    println!("  database: {}", config.storage.database_path);
    println!("  gateway:  {}:{}", config.gateway.host, config.gateway.port);
    for line in describe_tenants(config) {
        println!("  tenant   {line}");
    }
    Ok(())
}

/// Prints the digest for `date` (default: today, UTC) as JSON.
pub async fn run_digest(
    config: &SwitchboardConfig,
    tenant_id: &str,
    date: Option<NaiveDate>,
    refresh: bool,
) -> Result<DailyDigest, SwitchboardError> {
    if config.tenant(tenant_id).is_none() {
        return Err(SwitchboardError::TenantNotFound(tenant_id.to_string()));
    }
    let (orchestrator, db) = open(config).await?;
    let now = Utc::now();
    let digest = orchestrator
        .store()
        .daily_digest(tenant_id, date.unwrap_or_else(|| now.date_naive()), refresh, now)
        .await;
    db.close().await?;
    digest
}

/// Runs the follow-up job once across every tenant.
pub async fn run_followups(config: &SwitchboardConfig) -> Result<(usize, usize), SwitchboardError> {
    let tenants = build_tenants(config)?;
    let (orchestrator, db) = open(config).await?;
    let report = orchestrator.run_followups(&tenants, Utc::now()).await;
    orchestrator.background().settle().await;
    db.close().await?;
    let report = report?;
    Ok((report.analyzed, report.flagged))
}

/// Deletes expired guard rows and learned entries.
pub async fn run_purge(config: &SwitchboardConfig) -> Result<PurgeReport, SwitchboardError> {
    let (orchestrator, db) = open(config).await?;
    let report = orchestrator.purge(Utc::now()).await;
    db.close().await?;
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> SwitchboardConfig {
        let mut config = switchboard_config::load_and_validate_str(
            r#"
[[fallback.providers]]
name = "main"
kind = "openai"
model = "gpt-4o-mini"
api_key = "sk-test"

[[tenants]]
id = "bakery"
bot_enabled = false

[tenants.line]
channel_secret = "secret"
access_token = "token"
"#,
        )
        .unwrap();
        config.storage.database_path = dir.path().join("ops.db").to_string_lossy().into_owned();
        config
    }

    #[test]
    fn describes_each_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let lines = describe_tenants(&config(&dir));
        assert_eq!(lines, vec!["bakery: channels [line], chain [main], bot off".to_string()]);
    }

    #[tokio::test]
    async fn digest_of_empty_day() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let digest = run_digest(&config(&dir), "bakery", Some(date), false).await.unwrap();
        assert_eq!(digest.date, date);
        assert_eq!(digest.customer_messages, 0);
    }

    #[tokio::test]
    async fn digest_for_unknown_tenant_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_digest(&config(&dir), "nobody", None, false).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn purge_and_followups_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        assert_eq!(run_purge(&config).await.unwrap(), PurgeReport::default());
        assert_eq!(run_followups(&config).await.unwrap(), (0, 0));
    }
}
