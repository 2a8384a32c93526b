// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Opens the shared store, wires every tenant, starts the gateway and the
//! periodic follow-up and purge jobs, then waits for SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_gateway::auth::AuthConfig;
use switchboard_gateway::{GatewayState, ServerConfig, start_server};
use switchboard_orchestrator::tenant::TenantDirectory;
use switchboard_orchestrator::{KeywordResolver, Orchestrator, shutdown};
use switchboard_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::wiring::build_tenants;

/// How long shutdown waits for in-flight background work.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Expired guard rows and learned entries are purged this often.
const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    info!(
        service = %config.service.name,
        tenants = config.tenants.len(),
        "starting switchboard serve"
    );
    if config.gateway.admin_token.is_none() {
        warn!("gateway.admin_token is not set, the review API will reject every request");
    }

    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    let tenants = Arc::new(build_tenants(&config)?);
    let orchestrator = Orchestrator::new(&config, db.clone(), Arc::new(KeywordResolver::default()));

    let cancel = shutdown::install_signal_handler();

    spawn_followup_job(
        orchestrator.clone(),
        Arc::clone(&tenants),
        Duration::from_secs(u64::from(config.followup.interval_minutes) * 60),
        cancel.clone(),
    );
    spawn_purge_job(orchestrator.clone(), PURGE_INTERVAL, cancel.clone());

    let state = GatewayState {
        orchestrator: orchestrator.clone(),
        tenants,
        auth: AuthConfig {
            admin_token: config.gateway.admin_token.clone(),
        },
        webhook_budget: Duration::from_millis(config.gateway.webhook_budget_ms),
        start_time: Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    let served = start_server(&server_config, state, cancel.clone()).await;

    // The server also returns on bind failure; stop the jobs either way.
    cancel.cancel();
    orchestrator.background().drain(DRAIN_TIMEOUT).await;
    if let Err(e) = db.close().await {
        warn!(error = %e, "failed to close database cleanly");
    }
    served?;

    info!("switchboard serve shutdown complete");
    Ok(())
}

fn spawn_followup_job(
    orchestrator: Orchestrator,
    tenants: Arc<TenantDirectory>,
    every: Duration,
    cancel: CancellationToken,
) {
    if every.is_zero() {
        info!("follow-up job disabled (interval_minutes = 0)");
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match orchestrator.run_followups(&tenants, Utc::now()).await {
                        Ok(report) if report.flagged > 0 => {
                            info!(analyzed = report.analyzed, flagged = report.flagged, "follow-up job flagged conversations");
                        }
                        Ok(report) => debug!(analyzed = report.analyzed, "follow-up job found nothing"),
                        Err(e) => warn!(error = %e, "follow-up job failed (non-fatal)"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("follow-up job shutting down");
                    break;
                }
            }
        }
    });
}

fn spawn_purge_job(orchestrator: Orchestrator, every: Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = orchestrator.purge(Utc::now()).await {
                        warn!(error = %e, "purge job failed (non-fatal)");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("purge job shutting down");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_test_utils::TestHarness;

    #[tokio::test]
    async fn zero_interval_disables_followups() {
        let h = TestHarness::builder().build().await.unwrap();
        spawn_followup_job(
            h.orchestrator.clone(),
            h.tenants.clone(),
            Duration::ZERO,
            CancellationToken::new(),
        );
    }
}
