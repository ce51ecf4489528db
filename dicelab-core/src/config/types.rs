//! Configuration record handed to the core by the thin outer layers.

use crate::core::dice_game::GameConfig;
use crate::core::types::BetType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub vault: VaultSection,
    /// One of `conservative | moderate | aggressive | experimental`
    #[serde(default)]
    pub strategy_preset: Option<String>,
    #[serde(default)]
    pub parking: ParkingConfig,
}

/// Runner-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_sessions")]
    pub default_sessions: u32,

    #[serde(default = "default_workers")]
    pub parallel_workers: u32,

    /// Specs with at least this many sessions run on the worker pool
    #[serde(default = "default_parallel_threshold")]
    pub auto_parallel_threshold: u32,

    /// Completed sessions between checkpoint writes; 0 disables
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    #[serde(default = "default_checkpoint_age")]
    pub max_checkpoint_age_days: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_sessions: default_sessions(),
            parallel_workers: default_workers(),
            auto_parallel_threshold: default_parallel_threshold(),
            checkpoint_interval: default_checkpoint_interval(),
            max_checkpoint_age_days: default_checkpoint_age(),
        }
    }
}

/// Vault sizing, see `money::vault`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    #[serde(default = "default_vault_ratio")]
    pub vault_ratio: f64,

    #[serde(default = "default_working_ratio")]
    pub working_ratio: f64,

    #[serde(default = "default_max_transfers")]
    pub max_transfers_per_day: u32,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            vault_ratio: default_vault_ratio(),
            working_ratio: default_working_ratio(),
            max_transfers_per_day: default_max_transfers(),
        }
    }
}

/// Sequential-nonce handling knobs consumed by the parking wrapper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParkingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Free toggles allowed before a nonce has to be consumed
    #[serde(default = "default_max_toggles")]
    pub max_toggles_before_bet: u32,

    #[serde(default = "default_parking_amount")]
    pub parking_bet_amount: Decimal,

    /// UNDER target of the parking bet; 98.0 wins ~97% of the time
    #[serde(default = "default_parking_target")]
    pub parking_target: f64,

    #[serde(default)]
    pub parking_bet_type: BetType,

    /// Preventive seed rotation after this many bets in one epoch
    #[serde(default = "default_rotation_after")]
    pub auto_seed_rotation_after: u32,

    /// Enter parking spontaneously after this many consecutive losses
    #[serde(default = "default_parking_losses")]
    pub parking_on_consecutive_losses: u32,

    /// Enter parking spontaneously at this drawdown ratio
    #[serde(default = "default_parking_drawdown")]
    pub parking_on_drawdown_percent: f64,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_toggles_before_bet: default_max_toggles(),
            parking_bet_amount: default_parking_amount(),
            parking_target: default_parking_target(),
            parking_bet_type: BetType::Under,
            auto_seed_rotation_after: default_rotation_after(),
            parking_on_consecutive_losses: default_parking_losses(),
            parking_on_drawdown_percent: default_parking_drawdown(),
        }
    }
}

fn default_sessions() -> u32 {
    100
}
fn default_workers() -> u32 {
    4
}
fn default_parallel_threshold() -> u32 {
    50
}
fn default_checkpoint_interval() -> u32 {
    100
}
fn default_checkpoint_age() -> u32 {
    30
}
fn default_vault_ratio() -> f64 {
    0.85
}
fn default_working_ratio() -> f64 {
    0.15
}
fn default_max_transfers() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_max_toggles() -> u32 {
    3
}
fn default_parking_amount() -> Decimal {
    dec!(0.00015)
}
fn default_parking_target() -> f64 {
    98.0
}
fn default_rotation_after() -> u32 {
    1000
}
fn default_parking_losses() -> u32 {
    5
}
fn default_parking_drawdown() -> f64 {
    0.10
}
