//! Common utilities for all binaries.
//!
//! Shared initialization, CLI parsing and result printing. The binaries
//! are thin: they resolve a configuration record, hand it to the core and
//! print what comes back.

use anyhow::Result;
use clap::Parser;
use dicelab_core::config::Config;
use dicelab_core::runner::{PlanResult, RunnerOptions};
use dicelab_core::sinks::LogClass;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments shared by every binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to a dicelab.toml configuration file
    #[arg(short = 'f', long)]
    pub config: Option<PathBuf>,

    /// Total capital for the vault
    #[arg(long, default_value = "100")]
    pub capital: String,

    /// Sessions to run (overrides config default_sessions)
    #[arg(short = 'n', long)]
    pub sessions: Option<u32>,

    /// Worker pool width (overrides config parallel_workers)
    #[arg(short = 'w', long)]
    pub workers: Option<u32>,

    /// Seed for deterministic runs; omit for an entropy-derived one
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory for summary documents
    #[arg(short = 'o', long, default_value = "results")]
    pub output_dir: PathBuf,

    /// Root directory for detailed JSONL event logs (omit to disable)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Directory for resumable checkpoints (omit to disable)
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl CommonArgs {
    /// Load the config file (or defaults) and apply CLI overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(workers) = self.workers {
            config.simulation.parallel_workers = workers;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn capital(&self) -> Result<Decimal> {
        Decimal::from_str(&self.capital)
            .map_err(|e| anyhow::anyhow!("invalid --capital '{}': {e}", self.capital))
    }

    /// Wall-clock-derived seed unless one was pinned on the command line;
    /// determinism is opt-in via --seed.
    pub fn seed_init(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }

    pub fn runner_options(&self, simulation_id: &str, log_class: LogClass) -> RunnerOptions {
        RunnerOptions {
            simulation_id: simulation_id.to_string(),
            log_root: self.log_dir.clone(),
            log_class,
            checkpoint_dir: self.checkpoint_dir.clone(),
        }
    }
}

/// Initialize tracing for a binary.
///
/// `RUST_LOG` overrides the CLI level when set. The default `info` output
/// is session-granular; `debug` additionally shows per-bet clamps,
/// adaptive switches, vault transfers and checkpoint writes. Scope it with
/// directives like `RUST_LOG=info,dicelab_core::runner=debug` to follow
/// one subsystem.
pub fn init_logging(args: &CommonArgs) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        // Machine-readable stream, one object per line like the JSONL
        // event sinks; bet-level detail still lives in those, not here
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    }
}

/// Print the final statistics of a run.
pub fn print_plan_result(result: &PlanResult) {
    tracing::info!("=== Run complete ===");
    tracing::info!("Sessions: {}", result.aggregate.sessions);
    tracing::info!("Total bets: {}", result.aggregate.total_bets);
    tracing::info!("Total profit: {}", result.aggregate.total_profit);
    tracing::info!(
        "Overall ROI: {:.4}%",
        result.aggregate.overall_roi * 100.0
    );
    tracing::info!(
        "Profitable sessions: {}/{} ({:.1}%)",
        result.aggregate.profitable_sessions,
        result.aggregate.sessions,
        result.aggregate.profitability_rate * 100.0
    );
    tracing::info!(
        "Bankrupt sessions: {} ({:.1}%)",
        result.aggregate.bankrupt_sessions,
        result.aggregate.bankrupt_rate * 100.0
    );
    for (reason, count) in &result.aggregate.stop_reasons {
        tracing::info!("  stop[{reason}]: {count}");
    }
    if result.cancelled {
        tracing::warn!("run was cancelled before completion");
    }
}
