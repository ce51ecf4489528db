//! Checkpoint recovery: list, resume or clean saved checkpoints.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dicelab_bins::{init_logging, print_plan_result, CommonArgs};
use dicelab_core::sinks::{write_plan_result, CheckpointManager, LogClass};
use dicelab_core::runner::SimulationRunner;
use dicelab_strategies::Factory;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage resumable simulation checkpoints")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Checkpoint directory
    #[arg(short = 'd', long, default_value = "checkpoints")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved checkpoints with recovery suggestions
    List,
    /// Resume an interrupted simulation by id
    Resume {
        simulation_id: String,
    },
    /// Delete old checkpoints
    Clean {
        /// Delete everything, not just expired checkpoints
        #[arg(long)]
        all: bool,
    },
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
    let manager = CheckpointManager::new(&args.dir)
        .with_context(|| format!("cannot open checkpoint dir {}", args.dir.display()))?;

    match &args.command {
        Command::List => {
            let checkpoints = manager.list();
            if checkpoints.is_empty() {
                tracing::info!("no checkpoints in {}", args.dir.display());
            }
            for info in &checkpoints {
                tracing::info!(
                    "{}: written {}, {}/{} sessions done",
                    info.simulation_id,
                    info.written_at.format("%Y-%m-%d %H:%M:%S"),
                    info.completed_sessions,
                    info.total_sessions,
                );
            }
            for suggestion in manager.recovery_suggestions(Utc::now()) {
                tracing::info!("{suggestion}");
            }
        }
        Command::Resume { simulation_id } => {
            let config = args.common.resolve_config()?;
            let checkpoint = manager
                .load(simulation_id)?
                .with_context(|| format!("no checkpoint named '{simulation_id}'"))?;
            tracing::info!(
                "resuming {simulation_id}: {} sessions already done",
                checkpoint.completed.len()
            );

            let mut options = args
                .common
                .runner_options(simulation_id, LogClass::SimulationSingle);
            options.checkpoint_dir = Some(args.dir.clone());
            let runner =
                SimulationRunner::new(config.simulation.clone(), config.game.clone(), options);
            let result = runner.resume(checkpoint, &Factory)?;

            print_plan_result(&result);
            let path = write_plan_result(
                &args.common.output_dir,
                &format!("{simulation_id}_resumed"),
                &result,
            )?;
            tracing::info!("results saved to {}", path.display());
        }
        Command::Clean { all } => {
            let config = args.common.resolve_config()?;
            let removed = if *all {
                let checkpoints = manager.list();
                let mut removed = 0;
                for info in checkpoints {
                    if manager.delete(&info.simulation_id) {
                        removed += 1;
                    }
                }
                removed
            } else {
                manager.prune(config.simulation.max_checkpoint_age_days, Utc::now())
            };
            tracing::info!("removed {removed} checkpoint(s)");
        }
    }
    Ok(())
}
