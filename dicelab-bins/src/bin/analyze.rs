//! Analyze a previously written summary document.

use anyhow::Result;
use clap::Parser;
use dicelab_bins::init_logging;
use dicelab_bins::CommonArgs;
use dicelab_core::analysis::analyze_comparison;
use dicelab_core::sinks::read_plan_result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Analyze a saved run result")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Path to a summary JSON produced by simulate/compare/sweep
    #[arg(short, long)]
    input: PathBuf,
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
    let result = read_plan_result(&args.input)?;

    tracing::info!("plan: {} spec(s), {} session(s)", result.plan.specs.len(), result.aggregate.sessions);
    for spec in &result.per_spec {
        tracing::info!(
            "{}: roi {:.4}%, profitable {:.1}%, bankrupt {:.1}%, worst drawdown {}",
            spec.name,
            spec.aggregate.overall_roi * 100.0,
            spec.aggregate.profitability_rate * 100.0,
            spec.aggregate.bankrupt_rate * 100.0,
            spec.aggregate.worst_drawdown,
        );
    }

    let report = analyze_comparison(&result);
    tracing::info!("by ROI: {}", report.by_roi.join(" > "));
    tracing::info!("by win rate: {}", report.by_win_rate.join(" > "));
    tracing::info!("by drawdown: {}", report.by_drawdown.join(" > "));
    for recommendation in &report.recommendations {
        tracing::info!("{recommendation}");
    }

    // Session-level outliers worth a second look
    let mut sessions = result.per_session.clone();
    sessions.sort_by(|a, b| {
        a.roi
            .partial_cmp(&b.roi)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let (Some(worst), Some(best)) = (sessions.first(), sessions.last()) {
        tracing::info!(
            "worst session: {} roi {:.2}% ({})",
            worst.session_id,
            worst.roi * 100.0,
            worst.stop_reason
        );
        tracing::info!(
            "best session: {} roi {:.2}% ({})",
            best.session_id,
            best.roi * 100.0,
            best.stop_reason
        );
    }
    Ok(())
}
