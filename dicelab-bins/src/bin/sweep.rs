//! Parameter sweep: one strategy over a Cartesian grid of tunables.

use anyhow::{Context, Result};
use clap::Parser;
use dicelab_bins::{init_logging, print_plan_result, CommonArgs};
use dicelab_core::money::session::SessionConfig;
use dicelab_core::runner::{sweep_plan, SimulationRunner};
use dicelab_core::sinks::{write_plan_result, LogClass};
use dicelab_strategies::Factory;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sweep strategy parameters over a grid")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Strategy to sweep
    #[arg(short, long, default_value = "martingale")]
    strategy: String,

    /// Grid axis as name=v1,v2,v3 (repeatable), e.g. -P multiplier=1.5,2.0
    #[arg(short = 'P', long = "param")]
    params: Vec<String>,

    /// Session bet budget
    #[arg(long, default_value = "500")]
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

fn parse_axis(raw: &str) -> Result<(String, Vec<serde_json::Value>)> {
    let (name, values) = raw
        .split_once('=')
        .with_context(|| format!("bad --param '{raw}', expected name=v1,v2"))?;
    let values = values
        .split(',')
        .map(|v| {
            let trimmed = v.trim();
            // Numbers stay numbers; anything else passes through as text
            if let Ok(int) = trimmed.parse::<u64>() {
                json!(int)
            } else if let Ok(float) = trimmed.parse::<f64>() {
                json!(float)
            } else {
                json!(trimmed)
            }
        })
        .collect::<Vec<_>>();
    anyhow::ensure!(!values.is_empty(), "empty value list in --param '{raw}'");
    Ok((name.trim().to_string(), values))
}

fn run(args: &Args) -> Result<()> {
    let config = args.common.resolve_config()?;
    let capital = args.common.capital()?;

    let axes = args
        .params
        .iter()
        .map(|raw| parse_axis(raw))
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!axes.is_empty(), "at least one --param axis is required");

    let working = dicelab_core::money::mul_rate(capital, config.vault.working_ratio);
    let session = SessionConfig {
        initial_balance: dicelab_core::money::mul_rate(working, 0.15),
        max_bets: args.max_bets,
        min_bet: config.game.min_bet,
        ..SessionConfig::default()
    };

    let sessions = args.common.sessions.unwrap_or(50);
    let seed_init = args.common.seed_init();
    let plan = sweep_plan(
        &args.strategy,
        json!({ "strategy": args.strategy }),
        &axes,
        session,
        sessions,
        seed_init,
    );
    tracing::info!(
        combinations = plan.specs.len(),
        sessions_per_combination = sessions,
        "sweeping parameter grid"
    );

    let simulation_id = format!("sweep_{}_{seed_init:016x}", args.strategy);
    let runner = SimulationRunner::new(
        config.simulation.clone(),
        config.game.clone(),
        args.common
            .runner_options(&simulation_id, LogClass::SimulationSweep),
    );
    let result = runner.run(plan, &Factory)?;
    print_plan_result(&result);

    // Best combination by overall ROI
    if let Some(best) = result.per_spec.iter().max_by(|a, b| {
        a.aggregate
            .overall_roi
            .partial_cmp(&b.aggregate.overall_roi)
            .unwrap_or(std::cmp::Ordering::Equal)
    }) {
        tracing::info!(
            "best combination: {} (ROI {:.4}%)",
            best.name,
            best.aggregate.overall_roi * 100.0
        );
    }

    let path = write_plan_result(&args.common.output_dir, &simulation_id, &result)?;
    tracing::info!("results saved to {}", path.display());
    Ok(())
}
