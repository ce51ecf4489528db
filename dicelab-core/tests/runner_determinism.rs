//! Runner-level properties: parallel == serial, checkpoint resume
//! idempotence, cooperative cancellation.

use dicelab_core::config::SimulationConfig;
use dicelab_core::core::types::BetResult;
use dicelab_core::core::GameConfig;
use dicelab_core::money::session::{SessionConfig, SessionSummary};
use dicelab_core::runner::{Plan, PlanResult, RunSpec, RunnerOptions, SimulationRunner};
use dicelab_core::sinks::checkpoint::Checkpoint;
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use dicelab_core::EngineError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Self-contained flat bettor so this suite does not depend on the
/// strategies crate.
#[derive(Debug)]
struct TestFlat {
    config: StrategyConfig,
    metrics: StrategyMetrics,
    confidence: f64,
}

impl Strategy for TestFlat {
    fn name(&self) -> String {
        "TestFlat".into()
    }
    fn config(&self) -> &StrategyConfig {
        &self.config
    }
    fn metrics(&self) -> &StrategyMetrics {
        &self.metrics
    }
    fn metrics_mut(&mut self) -> &mut StrategyMetrics {
        &mut self.metrics
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence;
    }
    fn next_amount(&mut self, _state: &GameState) -> Decimal {
        self.config.base_bet
    }
    fn on_result(&mut self, _result: &BetResult) {}
    fn reset(&mut self) {
        self.metrics.reset();
        self.confidence = 1.0;
    }
}

fn build_flat(_config: &serde_json::Value) -> Result<Box<dyn Strategy>, EngineError> {
    Ok(Box::new(TestFlat {
        config: StrategyConfig::with_base_bet(dec!(0.001)),
        metrics: StrategyMetrics::default(),
        confidence: 1.0,
    }))
}

fn test_plan(sessions: u32) -> Plan {
    Plan::single(RunSpec {
        name: "test_flat".into(),
        strategy: serde_json::json!({ "strategy": "test_flat" }),
        session: SessionConfig {
            initial_balance: dec!(5),
            stop_loss_ratio: -0.99,
            take_profit_ratio: 99.0,
            max_bets: 40,
            ..SessionConfig::default()
        },
        sessions,
        seed_init: 4242,
    })
}

fn runner(workers: u32, threshold: u32) -> SimulationRunner {
    let simulation = SimulationConfig {
        parallel_workers: workers,
        auto_parallel_threshold: threshold,
        checkpoint_interval: 0,
        ..SimulationConfig::default()
    };
    SimulationRunner::new(simulation, GameConfig::default(), RunnerOptions::default())
}

/// The comparable portion of a summary: everything but wall-clock fields.
fn fingerprint(summary: &SessionSummary) -> impl PartialEq + std::fmt::Debug {
    (
        summary.session_id,
        summary.spec_index,
        summary.session_index,
        summary.final_balance,
        summary.profit,
        summary.bets,
        summary.wins,
        summary.losses,
        summary.max_drawdown,
        summary.stop_reason,
    )
}

fn fingerprints(result: &PlanResult) -> Vec<impl PartialEq + std::fmt::Debug> {
    result.per_session.iter().map(fingerprint).collect()
}

#[test]
fn parallel_equals_serial() {
    let plan = test_plan(60);

    let serial = runner(1, 1000).run(plan.clone(), &build_flat).unwrap();
    let parallel = runner(8, 10).run(plan, &build_flat).unwrap();

    assert_eq!(serial.per_session.len(), 60);
    assert_eq!(parallel.per_session.len(), 60);
    assert_eq!(fingerprints(&serial), fingerprints(&parallel));
    assert_eq!(
        serial.aggregate.total_profit,
        parallel.aggregate.total_profit
    );
}

#[test]
fn resume_from_any_prefix_is_idempotent() {
    let plan = test_plan(12);
    let full = runner(1, 1000).run(plan.clone(), &build_flat).unwrap();

    for cut in [1usize, 5, 11] {
        let checkpoint = Checkpoint {
            simulation_id: "resume_test".into(),
            written_at: chrono::Utc::now(),
            plan: plan.clone(),
            completed: full.per_session[..cut]
                .iter()
                .map(|s| (s.spec_index, s.session_index))
                .collect(),
            partial_summaries: full.per_session[..cut].to_vec(),
        };
        let resumed = runner(1, 1000).resume(checkpoint, &build_flat).unwrap();
        assert_eq!(
            fingerprints(&full),
            fingerprints(&resumed),
            "divergence when resuming after {cut} sessions"
        );
    }
}

#[test]
fn checkpoints_are_written_and_cleared() {
    let dir = tempfile::tempdir().unwrap();
    let simulation = SimulationConfig {
        parallel_workers: 1,
        auto_parallel_threshold: 1000,
        checkpoint_interval: 5,
        ..SimulationConfig::default()
    };
    let options = RunnerOptions {
        simulation_id: "ckpt_test".into(),
        checkpoint_dir: Some(dir.path().to_path_buf()),
        ..RunnerOptions::default()
    };
    let runner = SimulationRunner::new(simulation, GameConfig::default(), options);
    let result = runner.run(test_plan(12), &build_flat).unwrap();
    assert_eq!(result.per_session.len(), 12);

    // Completed cleanly: the checkpoint was deleted at the end
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .ends_with(".checkpoint.json")
        })
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn cancellation_stops_dispatch() {
    let runner = runner(1, 1000);
    runner.cancel_token().store(true, std::sync::atomic::Ordering::Relaxed);
    let result = runner.run(test_plan(20), &build_flat).unwrap();
    assert!(result.cancelled);
    assert!(result.per_session.is_empty());
}

#[test]
fn builder_failure_aborts_the_run() {
    let failing = |_: &serde_json::Value| -> Result<Box<dyn Strategy>, EngineError> {
        Err(EngineError::config("strategy", "nope"))
    };
    let err = runner(1, 1000).run(test_plan(3), &failing).unwrap_err();
    assert!(err.is_fatal_for_run());
}
