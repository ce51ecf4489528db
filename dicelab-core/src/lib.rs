//! dicelab-core - provably-fair dice-betting simulation engine
//!
//! Replays a bettor's experience against a cryptographically reproducible
//! dice oracle (the Bitsler HMAC-SHA512 algorithm), drives it with
//! composable betting strategies and collects per-bet telemetry for offline
//! analysis of strategy performance, drawdown and ruin probability. This is
//! a research tool: no real-money placement, no network I/O to any wagering
//! service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SimulationRunner                                            │
//! │  plan → worker pool → MPSC results → aggregate / checkpoint  │
//! └──────────────────────────────────────────────────────────────┘
//!          │ one session per dispatch
//!          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SimulationEngine (single-threaded session loop)             │
//! │                                                              │
//! │  Strategy ──decide──▶ DiceGame ──roll──▶ BetResult           │
//! │     ▲                    │(owns ProvablyFair oracle)         │
//! │     │                    ▼                                   │
//! │  update ◀── Session / GameState ──▶ EventBus ──▶ JSONL sink  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Determinism: given a spec's `seed_init`, every session derives its own
//! oracle seeds and session id, so the bet stream is bit-exact reproducible
//! regardless of worker count.
//!
//! ## Crates in this workspace
//!
//! - **dicelab-core** (this crate) - oracle, game, money, sessions,
//!   strategy framework, engine, runner, sinks
//! - **dicelab-strategies** - Flat, Martingale, Fibonacci, D'Alembert,
//!   Paroli, Composite, Adaptive and the Parking wrapper
//! - **dicelab-bins** - `simulate`, `compare`, `sweep`, `analyze`,
//!   `recovery` binaries

pub mod analysis;
pub mod config;
pub mod core;
pub mod engine;
pub mod money;
pub mod runner;
pub mod sinks;
pub mod state;
pub mod strategy;

pub use crate::core::{
    AltAction, BetDecision, BetResult, BetType, DiceGame, EngineError, Event, EventBus,
    EventKind, EventSink, GameConfig, ProvablyFair, SeedInfo, SeedPair, StopReason,
};
pub use engine::SimulationEngine;
pub use money::{Session, SessionConfig, Vault, VaultConfig};
pub use runner::{Plan, PlanResult, RunSpec, SimulationRunner, StrategyBuilder};
pub use state::GameState;
pub use strategy::{Strategy, StrategyConfig, StrategyMetrics, SwitchRecord};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Config, ParkingConfig, StrategyPreset};
    pub use crate::core::{
        AltAction, BetDecision, BetResult, BetType, DiceGame, EngineError, EventBus, EventKind,
        GameConfig, ProvablyFair, StopReason,
    };
    pub use crate::engine::SimulationEngine;
    pub use crate::money::session::{SessionConfig, SessionSummary};
    pub use crate::money::{Vault, VaultConfig};
    pub use crate::runner::{Plan, PlanResult, RunSpec, SimulationRunner, StrategyBuilder};
    pub use crate::state::GameState;
    pub use crate::strategy::{Strategy, StrategyConfig, StrategyMetrics};
}
