//! Run several strategies over identical session configs and rank them.

use anyhow::Result;
use clap::Parser;
use dicelab_bins::{init_logging, print_plan_result, CommonArgs};
use dicelab_core::analysis::analyze_comparison;
use dicelab_core::money::session::SessionConfig;
use dicelab_core::runner::{comparison_plan, SimulationRunner};
use dicelab_core::sinks::{write_plan_result, LogClass};
use dicelab_strategies::Factory;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare strategies side by side")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Comma-separated strategy names
    #[arg(
        short,
        long,
        default_value = "flat,martingale,fibonacci,dalembert,paroli"
    )]
    strategies: String,

    /// Strategy preset applied to every contender
    #[arg(short, long)]
    preset: Option<String>,

    /// Session bet budget
    #[arg(long, default_value = "1000")]
    max_bets: u64,
}

fn main() {
    let args = Args::parse();
    init_logging(&args.common);
    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.common.resolve_config()?;
    let capital = args.common.capital()?;

    let contenders: Vec<(String, serde_json::Value)> = args
        .strategies
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let mut value = json!({ "strategy": name });
            if let Some(preset) = &args.preset {
                value["preset"] = json!(preset);
            }
            (name.to_string(), value)
        })
        .collect();
    anyhow::ensure!(
        contenders.len() >= 2,
        "need at least two strategies to compare, got {}",
        contenders.len()
    );

    let working = dicelab_core::money::mul_rate(capital, config.vault.working_ratio);
    let session = SessionConfig {
        initial_balance: dicelab_core::money::mul_rate(working, 0.15),
        max_bets: args.max_bets,
        min_bet: config.game.min_bet,
        ..SessionConfig::default()
    };

    let sessions = args
        .common
        .sessions
        .unwrap_or(config.simulation.default_sessions);
    let seed_init = args.common.seed_init();
    let plan = comparison_plan(contenders, session, sessions, seed_init);

    let simulation_id = format!("compare_{seed_init:016x}");
    let runner = SimulationRunner::new(
        config.simulation.clone(),
        config.game.clone(),
        args.common
            .runner_options(&simulation_id, LogClass::SimulationComparison),
    );
    let result = runner.run(plan, &Factory)?;

    print_plan_result(&result);
    let report = analyze_comparison(&result);
    tracing::info!("=== Rankings (best first) ===");
    tracing::info!("by ROI: {}", report.by_roi.join(" > "));
    tracing::info!(
        "by profitability: {}",
        report.by_profitability_rate.join(" > ")
    );
    tracing::info!("by drawdown: {}", report.by_drawdown.join(" > "));
    for recommendation in &report.recommendations {
        tracing::info!("{recommendation}");
    }

    let path = write_plan_result(&args.common.output_dir, &simulation_id, &result)?;
    tracing::info!("results saved to {}", path.display());
    Ok(())
}
