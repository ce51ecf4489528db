//! Multi-session orchestration: plan execution, parameter sweep,
//! comparison, aggregation and checkpoint-based resume.
//!
//! Sessions are embarrassingly parallel: each worker takes whole sessions,
//! builds a fresh strategy and a fresh deterministically-seeded oracle per
//! session, and reports summaries over an MPSC channel to the aggregator.
//! No state is shared across sessions except the read-only plan and the
//! result channel, so a single session's bet stream is bit-identical
//! whether the plan runs on one worker or eight.

use crate::config::SimulationConfig;
use crate::core::dice_game::{DiceGame, GameConfig};
use crate::core::errors::EngineError;
use crate::core::events::{Event, EventBus, EventKind, EventSink};
use crate::core::provably_fair::ProvablyFair;
use crate::core::types::StopReason;
use crate::engine::SimulationEngine;
use crate::money::session::{SessionConfig, SessionSummary};
use crate::money::vault::Vault;
use crate::sinks::checkpoint::{Checkpoint, CheckpointManager, SessionKey};
use crate::sinks::jsonl::{JsonlLogger, LogClass};
use crate::strategy::Strategy;
use chrono::{DateTime, Utc};
use crossbeam::channel;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// One strategy/session configuration to run `sessions` times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub name: String,
    /// Opaque strategy configuration, interpreted by the strategy builder
    pub strategy: serde_json::Value,
    pub session: SessionConfig,
    pub sessions: u32,
    /// Root of the deterministic seed derivation for this spec
    pub seed_init: u64,
}

/// An ordered list of run specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub specs: Vec<RunSpec>,
}

impl Plan {
    pub fn single(spec: RunSpec) -> Self {
        Self { specs: vec![spec] }
    }

    pub fn total_sessions(&self) -> u32 {
        self.specs.iter().map(|s| s.sessions).sum()
    }

    /// Every session slot in the plan, spec-major.
    pub fn session_keys(&self) -> Vec<SessionKey> {
        let mut keys = Vec::with_capacity(self.total_sessions() as usize);
        for (spec_index, spec) in self.specs.iter().enumerate() {
            for session_index in 0..spec.sessions {
                keys.push((spec_index, session_index));
            }
        }
        keys
    }
}

/// Whole-plan statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub sessions: usize,
    pub total_bets: u64,
    pub total_wagered: Decimal,
    pub total_profit: Decimal,
    pub overall_roi: f64,
    pub profitable_sessions: usize,
    pub profitability_rate: f64,
    pub bankrupt_sessions: usize,
    pub bankrupt_rate: f64,
    pub average_win_rate: f64,
    pub average_roi: f64,
    pub average_max_drawdown: f64,
    pub worst_drawdown: Decimal,
    pub stop_reasons: BTreeMap<String, u32>,
}

impl Aggregate {
    pub fn from_summaries(summaries: &[SessionSummary]) -> Self {
        let sessions = summaries.len();
        let total_bets = summaries.iter().map(|s| s.bets).sum();
        let total_wagered: Decimal = summaries.iter().map(|s| s.total_wagered).sum();
        let total_profit: Decimal = summaries.iter().map(|s| s.profit).sum();
        let profitable_sessions = summaries
            .iter()
            .filter(|s| s.profit > Decimal::ZERO)
            .count();
        let bankrupt_sessions = summaries
            .iter()
            .filter(|s| s.stop_reason == StopReason::Bankrupt)
            .count();
        let worst_drawdown = summaries
            .iter()
            .map(|s| s.max_drawdown)
            .max()
            .unwrap_or(Decimal::ZERO);
        let mut stop_reasons = BTreeMap::new();
        for summary in summaries {
            *stop_reasons
                .entry(summary.stop_reason.as_str().to_string())
                .or_insert(0u32) += 1;
        }
        let n = sessions.max(1) as f64;
        Self {
            sessions,
            total_bets,
            total_wagered,
            total_profit,
            overall_roi: if total_wagered.is_zero() {
                0.0
            } else {
                (total_profit / total_wagered).to_f64().unwrap_or(0.0)
            },
            profitable_sessions,
            profitability_rate: profitable_sessions as f64 / n,
            bankrupt_sessions,
            bankrupt_rate: bankrupt_sessions as f64 / n,
            average_win_rate: summaries.iter().map(|s| s.win_rate).sum::<f64>() / n,
            average_roi: summaries.iter().map(|s| s.roi).sum::<f64>() / n,
            average_max_drawdown: summaries
                .iter()
                .map(|s| s.max_drawdown.to_f64().unwrap_or(0.0))
                .sum::<f64>()
                / n,
            worst_drawdown,
            stop_reasons,
        }
    }
}

/// Per-spec slice of the aggregate, for comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecAggregate {
    pub spec_index: usize,
    pub name: String,
    pub aggregate: Aggregate,
}

/// The single result document of a plan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub plan: Plan,
    /// Sorted by (spec_index, session_index)
    pub per_session: Vec<SessionSummary>,
    pub per_spec: Vec<SpecAggregate>,
    pub aggregate: Aggregate,
    pub completed_at: DateTime<Utc>,
    pub cancelled: bool,
}

/// Builds a strategy instance from a spec's opaque configuration value.
/// Implemented by the strategies crate's factory; the core never names
/// concrete strategies.
pub trait StrategyBuilder: Sync {
    fn build(&self, config: &serde_json::Value) -> Result<Box<dyn Strategy>, EngineError>;
}

impl<F> StrategyBuilder for F
where
    F: Fn(&serde_json::Value) -> Result<Box<dyn Strategy>, EngineError> + Sync,
{
    fn build(&self, config: &serde_json::Value) -> Result<Box<dyn Strategy>, EngineError> {
        self(config)
    }
}

/// Where the runner writes its artifacts.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub simulation_id: String,
    pub log_root: Option<PathBuf>,
    pub log_class: LogClass,
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            simulation_id: format!("sim_{}", Uuid::new_v4().simple()),
            log_root: None,
            log_class: LogClass::SimulationSingle,
            checkpoint_dir: None,
        }
    }
}

/// Orchestrates plan execution.
pub struct SimulationRunner {
    simulation: SimulationConfig,
    game: GameConfig,
    options: RunnerOptions,
    cancel: Arc<AtomicBool>,
}

impl SimulationRunner {
    pub fn new(simulation: SimulationConfig, game: GameConfig, options: RunnerOptions) -> Self {
        Self {
            simulation,
            game,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Token observed by workers between bets; set it to abort.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run a plan from scratch.
    pub fn run(
        &self,
        plan: Plan,
        builder: &dyn StrategyBuilder,
    ) -> Result<PlanResult, EngineError> {
        self.run_internal(plan, builder, HashSet::new(), Vec::new())
    }

    /// Resume from a checkpoint: completed sessions are skipped, their
    /// summaries reused verbatim.
    pub fn resume(
        &self,
        checkpoint: Checkpoint,
        builder: &dyn StrategyBuilder,
    ) -> Result<PlanResult, EngineError> {
        let completed: HashSet<SessionKey> = checkpoint.completed.iter().copied().collect();
        info!(
            simulation_id = %checkpoint.simulation_id,
            completed = completed.len(),
            "resuming from checkpoint"
        );
        self.run_internal(
            checkpoint.plan,
            builder,
            completed,
            checkpoint.partial_summaries,
        )
    }

    fn run_internal(
        &self,
        plan: Plan,
        builder: &dyn StrategyBuilder,
        completed: HashSet<SessionKey>,
        mut summaries: Vec<SessionSummary>,
    ) -> Result<PlanResult, EngineError> {
        let worklist: Vec<SessionKey> = plan
            .session_keys()
            .into_iter()
            .filter(|key| !completed.contains(key))
            .collect();

        let checkpoints = match &self.options.checkpoint_dir {
            Some(dir) => {
                let manager = CheckpointManager::new(dir).map_err(|e| EngineError::SinkIo {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                })?;
                manager.prune(self.simulation.max_checkpoint_age_days, Utc::now());
                Some(manager)
            }
            None => None,
        };

        let aggregator_log = self.open_log("aggregator");

        let parallel = worklist.len() >= self.simulation.auto_parallel_threshold as usize
            && self.simulation.parallel_workers > 1;

        let mut fatal: Option<EngineError> = None;
        if parallel {
            self.run_parallel(
                &plan,
                builder,
                &worklist,
                &mut summaries,
                checkpoints.as_ref(),
                aggregator_log.as_ref(),
                &mut fatal,
            );
        } else {
            self.run_serial(
                &plan,
                builder,
                &worklist,
                &mut summaries,
                checkpoints.as_ref(),
                aggregator_log.as_ref(),
                &mut fatal,
            );
        }

        if let Some(err) = fatal {
            // Leave the last checkpoint on disk for recovery.
            error!(%err, "run aborted on fatal error");
            return Err(err);
        }

        summaries.sort_by_key(|s| (s.spec_index, s.session_index));

        let per_spec = plan
            .specs
            .iter()
            .enumerate()
            .map(|(spec_index, spec)| {
                let slice: Vec<SessionSummary> = summaries
                    .iter()
                    .filter(|s| s.spec_index == spec_index)
                    .cloned()
                    .collect();
                SpecAggregate {
                    spec_index,
                    name: spec.name.clone(),
                    aggregate: Aggregate::from_summaries(&slice),
                }
            })
            .collect();

        let cancelled = self.cancel.load(Ordering::Relaxed);
        let result = PlanResult {
            aggregate: Aggregate::from_summaries(&summaries),
            per_session: summaries,
            per_spec,
            plan,
            completed_at: Utc::now(),
            cancelled,
        };

        // A run that finished cleanly no longer needs its checkpoint.
        if let (Some(manager), false) = (&checkpoints, cancelled) {
            manager.delete(&self.options.simulation_id);
        }

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_serial(
        &self,
        plan: &Plan,
        builder: &dyn StrategyBuilder,
        worklist: &[SessionKey],
        summaries: &mut Vec<SessionSummary>,
        checkpoints: Option<&CheckpointManager>,
        aggregator_log: Option<&Arc<Mutex<JsonlLogger>>>,
        fatal: &mut Option<EngineError>,
    ) {
        let log = self.open_log("w0");
        let mut since_checkpoint = 0u32;
        for &key in worklist {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            match self.execute_session(plan, builder, key, log.as_ref()) {
                Ok(summary) => {
                    summaries.push(summary);
                    since_checkpoint += 1;
                    self.maybe_checkpoint(
                        plan,
                        summaries,
                        checkpoints,
                        aggregator_log,
                        &mut since_checkpoint,
                    );
                }
                Err(err) => {
                    if err.is_fatal_for_run() {
                        *fatal = Some(err);
                        break;
                    }
                    warn!(%err, "session failed, continuing");
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_parallel(
        &self,
        plan: &Plan,
        builder: &dyn StrategyBuilder,
        worklist: &[SessionKey],
        summaries: &mut Vec<SessionSummary>,
        checkpoints: Option<&CheckpointManager>,
        aggregator_log: Option<&Arc<Mutex<JsonlLogger>>>,
        fatal: &mut Option<EngineError>,
    ) {
        let workers = self.simulation.parallel_workers as usize;
        let (work_tx, work_rx) = channel::unbounded::<SessionKey>();
        let (result_tx, result_rx) =
            channel::unbounded::<Result<SessionSummary, EngineError>>();
        for &key in worklist {
            work_tx.send(key).expect("unbounded send");
        }
        drop(work_tx);

        info!(
            workers,
            sessions = worklist.len(),
            "dispatching sessions to worker pool"
        );

        std::thread::scope(|scope| {
            for worker_id in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let log = self.open_log(&format!("w{worker_id}"));
                scope.spawn(move || {
                    while let Ok(key) = work_rx.recv() {
                        if self.cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        let outcome = self.execute_session(plan, builder, key, log.as_ref());
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                    if let Some(log) = log {
                        if let Ok(mut log) = log.lock() {
                            log.flush();
                        }
                    }
                });
            }
            drop(result_tx);

            // Aggregator: the only writer of checkpoints.
            let mut since_checkpoint = 0u32;
            while let Ok(outcome) = result_rx.recv() {
                match outcome {
                    Ok(summary) => {
                        summaries.push(summary);
                        since_checkpoint += 1;
                        self.maybe_checkpoint(
                            plan,
                            summaries,
                            checkpoints,
                            aggregator_log,
                            &mut since_checkpoint,
                        );
                    }
                    Err(err) => {
                        if err.is_fatal_for_run() {
                            self.cancel.store(true, Ordering::Relaxed);
                            if fatal.is_none() {
                                *fatal = Some(err);
                            }
                        } else {
                            warn!(%err, "session failed, continuing");
                        }
                    }
                }
            }
        });
    }

    /// Run one session slot with a fresh strategy and a fresh oracle.
    fn execute_session(
        &self,
        plan: &Plan,
        builder: &dyn StrategyBuilder,
        (spec_index, session_index): SessionKey,
        log: Option<&Arc<Mutex<JsonlLogger>>>,
    ) -> Result<SessionSummary, EngineError> {
        let spec = &plan.specs[spec_index];
        let mut strategy = builder.build(&spec.strategy)?;
        strategy.reset();

        let rng_seed = derive_session_seed(spec.seed_init, spec_index, session_index);
        let client_seed = format!("dicelab-{spec_index}-{session_index}");
        let oracle = ProvablyFair::deterministic(rng_seed, client_seed);
        let game = DiceGame::new(self.game.clone(), oracle);

        let mut bus = EventBus::new();
        if let Some(log) = log {
            bus.subscribe(Box::new(SharedSink(log.clone())));
        }

        let session_id = derive_session_id(spec.seed_init, spec_index, session_index);
        let mut engine = SimulationEngine::new(game, bus);
        let mut summary = engine.run_session(
            session_id,
            spec.session.clone(),
            strategy.as_mut(),
            &self.cancel,
        );
        summary.spec_index = spec_index;
        summary.session_index = session_index;
        Ok(summary)
    }

    fn maybe_checkpoint(
        &self,
        plan: &Plan,
        summaries: &[SessionSummary],
        checkpoints: Option<&CheckpointManager>,
        aggregator_log: Option<&Arc<Mutex<JsonlLogger>>>,
        since_checkpoint: &mut u32,
    ) {
        let interval = self.simulation.checkpoint_interval;
        if interval == 0 || *since_checkpoint < interval {
            return;
        }
        let Some(manager) = checkpoints else {
            return;
        };
        *since_checkpoint = 0;
        let checkpoint = Checkpoint {
            simulation_id: self.options.simulation_id.clone(),
            written_at: Utc::now(),
            plan: plan.clone(),
            completed: summaries
                .iter()
                .map(|s| (s.spec_index, s.session_index))
                .collect(),
            partial_summaries: summaries.to_vec(),
        };
        match manager.write(&checkpoint) {
            Ok(path) => {
                if let Some(log) = aggregator_log {
                    if let Ok(mut log) = log.lock() {
                        log.on_event(&Event::new(
                            EventKind::CheckpointWritten,
                            None,
                            serde_json::json!({
                                "simulation_id": self.options.simulation_id,
                                "completed_sessions": checkpoint.completed.len(),
                                "path": path.display().to_string(),
                            }),
                        ));
                    }
                }
            }
            Err(err) => warn!(%err, "checkpoint write failed"),
        }
    }

    fn open_log(&self, worker: &str) -> Option<Arc<Mutex<JsonlLogger>>> {
        let root = self.options.log_root.as_ref()?;
        let filename = format!(
            "{}_{}_{}.jsonl",
            self.options.simulation_id,
            worker,
            Utc::now().format("%Y%m%d_%H%M%S"),
        );
        match JsonlLogger::create(root, self.options.log_class, &filename) {
            Ok(logger) => Some(Arc::new(Mutex::new(logger))),
            Err(err) => {
                warn!(%err, "could not open event log, continuing without");
                None
            }
        }
    }
}

/// Forwarding sink: lets per-session buses share a per-worker log file.
struct SharedSink(Arc<Mutex<JsonlLogger>>);

impl EventSink for SharedSink {
    fn on_event(&mut self, event: &Event) {
        if let Ok(mut logger) = self.0.lock() {
            logger.on_event(event);
        }
    }

    fn flush(&mut self) {
        if let Ok(mut logger) = self.0.lock() {
            logger.flush();
        }
    }
}

/// Apply a completed plan's session P&L to a vault, in deterministic
/// session order, and verify ledger closure.
pub fn settle_vault(vault: &mut Vault, result: &PlanResult) -> Result<(), EngineError> {
    use crate::money::vault::TransferTrigger;
    let mut cumulative_pnl = Decimal::ZERO;
    for summary in &result.per_session {
        if !vault.can_fund(summary.initial_balance) {
            // Deep losses drained the working side; pull from the vault
            // before giving up on the ledger.
            vault.replenish(TransferTrigger::Manual, summary.completed_at);
        }
        let initial = vault.create_session(summary.initial_balance)?;
        vault.close_session(initial, summary.final_balance, summary.completed_at);
        cumulative_pnl += summary.profit;
    }
    vault.check_closure(cumulative_pnl)
}

/// Deterministic per-session RNG seed: SHA-256 over the spec seed and the
/// session slot, folded to a u64.
pub fn derive_session_seed(seed_init: u64, spec_index: usize, session_index: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed_init.to_le_bytes());
    hasher.update((spec_index as u64).to_le_bytes());
    hasher.update(session_index.to_le_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

/// Deterministic session id from the same derivation, so resumed and
/// re-ordered runs agree on identity.
pub fn derive_session_id(seed_init: u64, spec_index: usize, session_index: u32) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(b"session-id");
    hasher.update(seed_init.to_le_bytes());
    hasher.update((spec_index as u64).to_le_bytes());
    hasher.update(session_index.to_le_bytes());
    let digest = hasher.finalize();
    let hi = u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"));
    let lo = u64::from_le_bytes(digest[8..16].try_into().expect("digest is 32 bytes"));
    Uuid::from_u64_pair(hi, lo)
}

/// Build a one-strategy-per-spec comparison plan over identical session
/// configs.
pub fn comparison_plan(
    strategies: Vec<(String, serde_json::Value)>,
    session: SessionConfig,
    sessions: u32,
    seed_init: u64,
) -> Plan {
    Plan {
        specs: strategies
            .into_iter()
            .map(|(name, strategy)| RunSpec {
                name,
                strategy,
                session: session.clone(),
                sessions,
                seed_init,
            })
            .collect(),
    }
}

/// Build a Cartesian parameter-sweep plan over one base strategy config.
pub fn sweep_plan(
    base_name: &str,
    base_strategy: serde_json::Value,
    parameters: &[(String, Vec<serde_json::Value>)],
    session: SessionConfig,
    sessions: u32,
    seed_init: u64,
) -> Plan {
    let mut combos: Vec<serde_json::Map<String, serde_json::Value>> =
        vec![serde_json::Map::new()];
    for (key, values) in parameters {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut widened = combo.clone();
                widened.insert(key.clone(), value.clone());
                next.push(widened);
            }
        }
        combos = next;
    }

    let specs = combos
        .into_iter()
        .map(|combo| {
            let mut strategy = base_strategy.clone();
            let label: Vec<String> = combo
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if let Some(object) = strategy.as_object_mut() {
                for (key, value) in combo {
                    object.insert(key, value);
                }
            }
            RunSpec {
                name: if label.is_empty() {
                    base_name.to_string()
                } else {
                    format!("{base_name}[{}]", label.join(","))
                },
                strategy,
                session: session.clone(),
                sessions,
                seed_init,
            }
        })
        .collect();

    Plan { specs }
}
