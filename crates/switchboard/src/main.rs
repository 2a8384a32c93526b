// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - multi-tenant conversation orchestration for customer-service chat.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod ops;
mod serve;
mod wiring;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use switchboard_config::SwitchboardConfig;
use tracing::error;

/// Switchboard - multi-tenant conversation orchestration for customer-service chat.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway, review API, and background jobs.
    Serve,
    /// Manage Switchboard configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Print a tenant's daily digest as JSON.
    Digest {
        tenant: String,
        /// Day to report (YYYY-MM-DD). Defaults to today, UTC.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Recompute even if a cached digest exists.
        #[arg(long)]
        refresh: bool,
    },
    /// Run the follow-up analysis job once.
    Followups,
    /// Delete expired dedup keys, rate counters, and learned entries.
    Purge,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate configuration and adapter credentials.
    Check {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> SwitchboardConfig {
    let loaded = match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Config {
            action: ConfigCommands::Check { plain },
        }) => ops::run_config_check(&config, plain),
        Some(Commands::Digest {
            tenant,
            date,
            refresh,
        }) => ops::run_digest(&config, &tenant, date, refresh)
            .await
            .and_then(|digest| {
                serde_json::to_string_pretty(&digest)
                    .map(|json| println!("{json}"))
                    .map_err(|e| switchboard_core::SwitchboardError::Internal(e.to_string()))
            }),
        Some(Commands::Followups) => ops::run_followups(&config).await.map(|(analyzed, flagged)| {
            println!("analyzed {analyzed} conversations, flagged {flagged}");
        }),
        Some(Commands::Purge) => ops::run_purge(&config).await.map(|report| {
            println!(
                "purged {} guard rows and {} learned entries",
                report.guard_rows, report.learned_entries
            );
        }),
        None => {
            println!("switchboard: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn parses_digest_arguments() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "--config",
            "/tmp/sb.toml",
            "digest",
            "bakery",
            "--date",
            "2026-10-15",
            "--refresh",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sb.toml")));
        match cli.command {
            Some(Commands::Digest {
                tenant,
                date,
                refresh,
            }) => {
                assert_eq!(tenant, "bakery");
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 10, 15));
                assert!(refresh);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_config_check() {
        let cli = Cli::try_parse_from(["switchboard", "config", "check", "--plain"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommands::Check { plain: true }
            })
        ));
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(Cli::try_parse_from(["switchboard", "digest", "bakery", "--date", "tomorrow"]).is_err());
    }
}
