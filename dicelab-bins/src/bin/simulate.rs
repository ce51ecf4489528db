//! Run one strategy for N sessions and write the summary document.

use anyhow::Result;
use clap::Parser;
use dicelab_bins::{init_logging, print_plan_result, CommonArgs};
use dicelab_core::money::session::SessionConfig;
use dicelab_core::money::vault::{Vault, VaultConfig};
use dicelab_core::runner::{settle_vault, Plan, RunSpec, SimulationRunner};
use dicelab_core::sinks::{write_plan_result, LogClass};
use dicelab_strategies::Factory;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate a betting strategy against the dice oracle")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Strategy name (flat, martingale, fibonacci, dalembert, paroli)
    #[arg(short, long, default_value = "flat")]
    strategy: String,

    /// Strategy preset (conservative, moderate, aggressive, experimental)
    #[arg(short, long)]
    preset: Option<String>,

    /// Base bet (overrides the preset)
    #[arg(long)]
    base_bet: Option<String>,

    /// Wrap the strategy in the parking handler
    #[arg(long)]
    parking: bool,

    /// Session bet budget
    #[arg(long, default_value = "1000")]
    max_bets: u64,

    /// Session stop-loss ratio (e.g. -0.5)
    #[arg(long, default_value = "-0.5", allow_hyphen_values = true)]
    stop_loss: f64,

    /// Session take-profit ratio (e.g. 1.0)
    #[arg(long, default_value = "1.0")]
    take_profit: f64,
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

    let mut vault = Vault::new(VaultConfig {
        total_capital: capital,
        vault_ratio: config.vault.vault_ratio,
        working_ratio: config.vault.working_ratio,
        max_transfers_per_day: config.vault.max_transfers_per_day,
    })?;

    let mut strategy_value = json!({ "strategy": args.strategy });
    if let Some(preset) = args.preset.as_deref().or(config.strategy_preset.as_deref()) {
        strategy_value["preset"] = json!(preset);
    }
    if let Some(base_bet) = &args.base_bet {
        strategy_value["base_bet"] = json!(base_bet);
    }
    if args.parking && config.parking.enabled {
        strategy_value["parking"] = serde_json::to_value(config.parking)?;
    }

    // One session draws a fixed slice of the working bankroll.
    let initial_balance = dicelab_core::money::mul_rate(vault.working_balance(), 0.15);
    let session = SessionConfig {
        initial_balance,
        stop_loss_ratio: args.stop_loss,
        take_profit_ratio: args.take_profit,
        max_bets: args.max_bets,
        min_bet: config.game.min_bet,
        ..SessionConfig::default()
    };

    // Surface "bet too large for the bankroll" before any session runs.
    if let Some(base_bet) = strategy_value.get("base_bet").and_then(|v| v.as_str()) {
        use std::str::FromStr;
        if let Ok(bet) = rust_decimal::Decimal::from_str(base_bet) {
            config.validate_base_bet(bet, initial_balance)?;
        }
    }

    let sessions = args
        .common
        .sessions
        .unwrap_or(config.simulation.default_sessions);
    let seed_init = args.common.seed_init();
    let plan = Plan::single(RunSpec {
        name: args.strategy.clone(),
        strategy: strategy_value,
        session,
        sessions,
        seed_init,
    });

    let simulation_id = format!("simulate_{}_{seed_init:016x}", args.strategy);
    let runner = SimulationRunner::new(
        config.simulation.clone(),
        config.game.clone(),
        args.common
            .runner_options(&simulation_id, LogClass::for_strategy(&args.strategy)),
    );

    let result = runner.run(plan, &Factory)?;
    settle_vault(&mut vault, &result)?;

    tracing::info!(
        "vault {} / working {} after settlement",
        vault.vault_balance(),
        vault.working_balance()
    );
    print_plan_result(&result);
    let path = write_plan_result(&args.common.output_dir, &simulation_id, &result)?;
    tracing::info!("results saved to {}", path.display());
    Ok(())
}
