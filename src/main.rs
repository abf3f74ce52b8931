// llm-shield - Policy and data-protection gateway for LLM traffic
//
// Sits between an interactive assistant and remote model providers. For
// every outbound prompt it decides whether the request is permitted, hard
// blocks regulated content, and rewrites remaining sensitive identifiers
// into stable per-session aliases; responses are rewritten back on the
// way in. Every decision lands in a hash-chained, signed audit log.
//
// Architecture:
// - Shield (shield.rs): orchestrates policy -> compliance -> sanitize
// - Session store: per-user bidirectional alias maps with TTL eviction
// - Audit logger: JSON Lines, hash chain, Ed25519 signatures
// - CLI (clap): version / init / scan / process / serve

mod audit;
mod cli;
mod compliance;
mod config;
mod crypto;
mod desanitize;
mod model;
mod policy;
mod sanitize;
mod session;
mod shield;
mod util;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use config::FullConfig;
use shield::Shield;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often the serve loop sweeps sessions and checks log rotation
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the JSON output of scan/process stays clean.
    // Precedence: RUST_LOG env var > default "info"
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("llm_shield=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        std::process::exit(1);
    };

    if let Err(err) = run(command).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Version => {
            cli::handle_version();
            Ok(())
        }
        Commands::Init => cli::handle_init(),
        Commands::Scan { content } => {
            let shield = build_shield()?;
            cli::handle_scan(&shield, &content)?;
            shield.shutdown().await
        }
        Commands::Process {
            user,
            content,
            provider,
        } => {
            let shield = build_shield()?;
            cli::handle_process(&shield, &user, &content, &provider)?;
            shield.shutdown().await
        }
        Commands::Serve => serve().await,
    }
}

fn build_shield() -> Result<Shield> {
    let config = FullConfig::load_or_default();
    Shield::new(config.to_shield_config())
}

/// Run until Ctrl+C, doing periodic maintenance: session TTL sweeps,
/// audit log rotation at day rollover, and retention cleanup
async fn serve() -> Result<()> {
    let shield = build_shield()?;
    tracing::info!(version = config::VERSION, "llm-shield serving");

    let mut maintenance = tokio::time::interval(MAINTENANCE_INTERVAL);
    maintenance.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut current_day = chrono::Utc::now().date_naive();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            _ = maintenance.tick() => {
                let swept = shield.cleanup_sessions();
                if swept > 0 {
                    tracing::info!(swept, "expired sessions removed");
                }

                let today = chrono::Utc::now().date_naive();
                if today != current_day {
                    current_day = today;
                    if let Err(err) = shield.audit().rotate() {
                        tracing::error!(error = %err, "audit log rotation failed");
                    }
                    match shield.audit().cleanup_old_logs() {
                        Ok(removed) if removed > 0 => {
                            tracing::info!(removed, "old audit logs removed");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "audit log cleanup failed"),
                    }
                }
            }
        }
    }

    shield.shutdown().await?;
    tracing::info!("shutdown complete");
    Ok(())
}
