//! Configuration loading and validation.
//!
//! The outer layers are thin: they load a TOML file (with `DICELAB__`
//! environment overrides), run [`Config::validate`] and hand the resolved
//! record to the core. Validation failures carry suggested remediations.

pub mod presets;
pub mod types;

pub use presets::StrategyPreset;
pub use types::{Config, ParkingConfig, SimulationConfig, VaultSection};

use crate::core::errors::EngineError;
use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;

impl Config {
    /// Load configuration from a TOML file with environment overrides
    /// (`DICELAB__GAME__HOUSE_EDGE=0.02` style).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loader = ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("DICELAB").separator("__"))
            .build()
            .context("failed to build configuration")?;

        let cfg: Config = loader
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate ranges and cross-field consistency.
    ///
    /// Only called before any session runs; a failure here aborts the
    /// whole run (`ConfigInvalid` is fatal).
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.simulation.parallel_workers == 0 {
            return Err(EngineError::config_with_hint(
                "simulation.parallel_workers",
                "worker count must be at least 1",
                "use 4 unless the host is constrained",
            ));
        }

        if !(0.0..0.5).contains(&self.game.house_edge) {
            return Err(EngineError::config(
                "game.house_edge",
                format!("house edge {} outside [0, 0.5)", self.game.house_edge),
            ));
        }
        if self.game.min_bet <= Decimal::ZERO {
            return Err(EngineError::config("game.min_bet", "must be positive"));
        }
        if self.game.max_bet <= self.game.min_bet {
            return Err(EngineError::config(
                "game.max_bet",
                "max_bet must exceed min_bet",
            ));
        }
        if self.game.min_multiplier < 1.01 || self.game.max_multiplier > 99.0 {
            return Err(EngineError::config_with_hint(
                "game.multiplier",
                format!(
                    "multiplier band [{}, {}] outside [1.01, 99.0]",
                    self.game.min_multiplier, self.game.max_multiplier
                ),
                "the platform accepts multipliers from 1.01x to 99x",
            ));
        }

        let ratio_sum = self.vault.vault_ratio + self.vault.working_ratio;
        if (ratio_sum - 1.0).abs() > 1e-9 {
            return Err(EngineError::config_with_hint(
                "vault.vault_ratio",
                format!("vault_ratio + working_ratio = {ratio_sum}, expected 1.0"),
                "use vault_ratio = 0.85, working_ratio = 0.15",
            ));
        }

        if let Some(name) = &self.strategy_preset {
            if StrategyPreset::parse(name).is_none() {
                return Err(EngineError::config_with_hint(
                    "strategy_preset",
                    format!("unknown preset '{name}'"),
                    "one of: conservative, moderate, aggressive, experimental",
                ));
            }
        }

        let parking = &self.parking;
        if parking.parking_target <= 0.0 || parking.parking_target >= 99.99 {
            return Err(EngineError::config(
                "parking.parking_target",
                format!("target {} outside (0, 99.99)", parking.parking_target),
            ));
        }
        if parking.parking_bet_amount < self.game.min_bet {
            return Err(EngineError::config_with_hint(
                "parking.parking_bet_amount",
                format!(
                    "parking bet {} below the game minimum {}",
                    parking.parking_bet_amount, self.game.min_bet
                ),
                format!("raise it to at least {}", self.game.min_bet),
            ));
        }
        if !(0.0..=1.0).contains(&parking.parking_on_drawdown_percent) {
            return Err(EngineError::config(
                "parking.parking_on_drawdown_percent",
                "drawdown trigger must be a ratio in [0, 1]",
            ));
        }

        Ok(())
    }

    /// Check a strategy's base bet against the working bankroll it will
    /// actually play with, producing the "consider N" style diagnostics.
    pub fn validate_base_bet(
        &self,
        base_bet: Decimal,
        working_capital: Decimal,
    ) -> Result<(), EngineError> {
        if working_capital <= Decimal::ZERO {
            return Err(EngineError::config(
                "vault.total_capital",
                "no working capital available",
            ));
        }
        let ratio = base_bet / working_capital;
        if ratio > rust_decimal_macros::dec!(0.05) {
            let percent = (ratio * Decimal::from(100)).round_dp(1);
            let suggested = crate::money::round_money(working_capital / Decimal::from(100)).normalize();
            return Err(EngineError::config_with_hint(
                "strategy.base_bet",
                format!("base_bet is {percent}% of the working capital"),
                format!("consider {suggested} (1% of working capital)"),
            ));
        }
        Ok(())
    }
}
