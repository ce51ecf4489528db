//! Strategy factory: builds any strategy tree from a flat JSON config.
//!
//! This is the one place that names concrete strategies; the core's runner
//! only sees the [`StrategyBuilder`] trait. The accepted shape:
//!
//! ```json
//! { "strategy": "martingale", "base_bet": "0.001", "max_losses": 8 }
//! { "strategy": "composite", "mode": "weighted",
//!   "strategies": [{ "strategy": "flat" }, { "strategy": "martingale" }] }
//! { "strategy": "adaptive", "initial": "flat",
//!   "rules": [{ "condition": "consecutive_losses", "threshold": 5,
//!               "target": "flat", "cooldown_bets": 10 }] }
//! { "strategy": "fibonacci", "parking": { "max_toggles_before_bet": 3 } }
//! ```
//!
//! `preset` applies one of the named profiles before field overrides;
//! `parking` (object or `true`) wraps the finished strategy.

use crate::adaptive::{Adaptive, AdaptiveConfig};
use crate::composite::{Composite, CompositeConfig};
use crate::dalembert::DAlembert;
use crate::fibonacci::Fibonacci;
use crate::flat::Flat;
use crate::martingale::Martingale;
use crate::parking::Parking;
use crate::paroli::Paroli;
use dicelab_core::config::{ParkingConfig, StrategyPreset};
use dicelab_core::core::types::BetType;
use dicelab_core::runner::StrategyBuilder;
use dicelab_core::strategy::{Strategy, StrategyConfig};
use dicelab_core::EngineError;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Unit-struct [`StrategyBuilder`] handed to the runner.
pub struct Factory;

impl StrategyBuilder for Factory {
    fn build(&self, config: &Value) -> Result<Box<dyn Strategy>, EngineError> {
        build_strategy(config)
    }
}

/// Build a basic (non-composed) strategy by factory name.
pub fn build_basic(
    name: &str,
    config: StrategyConfig,
) -> Result<Box<dyn Strategy>, EngineError> {
    match name.to_lowercase().as_str() {
        "flat" => Ok(Box::new(Flat::new(config))),
        "martingale" => Ok(Box::new(Martingale::new(config))),
        "fibonacci" => Ok(Box::new(Fibonacci::new(config))),
        "dalembert" | "d_alembert" => Ok(Box::new(DAlembert::new(config))),
        "paroli" => Ok(Box::new(Paroli::new(config))),
        other => Err(EngineError::config_with_hint(
            "strategy",
            format!("unknown strategy '{other}'"),
            "one of: flat, martingale, fibonacci, dalembert, paroli, composite, adaptive",
        )),
    }
}

/// Build a full strategy tree (basic, composite, adaptive; optionally
/// parking-wrapped) from a JSON value.
pub fn build_strategy(value: &Value) -> Result<Box<dyn Strategy>, EngineError> {
    let name = value
        .get("strategy")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::config("strategy", "missing 'strategy' field"))?;

    let config = strategy_config_from(value)?;
    let strategy: Box<dyn Strategy> = match name.to_lowercase().as_str() {
        "composite" => build_composite(value, config)?,
        "adaptive" => build_adaptive(value, config)?,
        basic => build_basic(basic, config)?,
    };

    wrap_parking(value, strategy)
}

fn strategy_config_from(value: &Value) -> Result<StrategyConfig, EngineError> {
    let mut config = match value.get("preset").and_then(Value::as_str) {
        Some(preset_name) => StrategyPreset::parse(preset_name)
            .ok_or_else(|| {
                EngineError::config_with_hint(
                    "preset",
                    format!("unknown preset '{preset_name}'"),
                    "one of: conservative, moderate, aggressive, experimental",
                )
            })?
            .strategy_config(),
        None => StrategyConfig::default(),
    };

    if let Some(base_bet) = value.get("base_bet") {
        config.base_bet = parse_decimal("base_bet", base_bet)?;
    }
    if let Some(min_bet) = value.get("min_bet") {
        config.min_bet = parse_decimal("min_bet", min_bet)?;
    }
    if let Some(max_bet) = value.get("max_bet") {
        config.max_bet = parse_decimal("max_bet", max_bet)?;
    }
    if let Some(multiplier) = value.get("multiplier").and_then(Value::as_f64) {
        config.multiplier = multiplier;
    }
    if let Some(max_losses) = value.get("max_losses").and_then(Value::as_u64) {
        config.max_losses = max_losses as u32;
    }
    if let Some(game_multiplier) = value.get("game_multiplier").and_then(Value::as_f64) {
        if !(1.01..=99.0).contains(&game_multiplier) {
            return Err(EngineError::config(
                "game_multiplier",
                format!("{game_multiplier} outside [1.01, 99.0]"),
            ));
        }
        config.game_multiplier = game_multiplier;
    }
    if let Some(bet_type) = value.get("bet_type").and_then(Value::as_str) {
        config.bet_type = match bet_type.to_lowercase().as_str() {
            "under" => BetType::Under,
            "over" => BetType::Over,
            other => {
                return Err(EngineError::config(
                    "bet_type",
                    format!("'{other}' is neither 'under' nor 'over'"),
                ))
            }
        };
    }
    Ok(config)
}

fn parse_decimal(field: &str, value: &Value) -> Result<Decimal, EngineError> {
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => n.as_f64().and_then(dicelab_core::money::dec_from_f64),
        _ => None,
    };
    parsed.ok_or_else(|| {
        EngineError::config(field, format!("'{value}' is not a decimal amount"))
    })
}

fn build_composite(
    value: &Value,
    config: StrategyConfig,
) -> Result<Box<dyn Strategy>, EngineError> {
    let mut composite_config = CompositeConfig::default();
    if let Some(mode) = value.get("mode") {
        composite_config.mode = serde_json::from_value(mode.clone()).map_err(|_| {
            EngineError::config_with_hint(
                "composite.mode",
                format!("unknown mode {mode}"),
                "one of: average, weighted, consensus, aggressive, conservative, rotate",
            )
        })?;
    }
    if let Some(threshold) = value.get("consensus_threshold").and_then(Value::as_f64) {
        composite_config.consensus_threshold = threshold;
    }
    if let Some(interval) = value.get("rotation_interval").and_then(Value::as_u64) {
        composite_config.rotation_interval = interval as u32;
    }

    let children_values = value
        .get("strategies")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            EngineError::config("composite.strategies", "missing child strategy list")
        })?;
    let children = children_values
        .iter()
        .map(build_strategy)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Box::new(Composite::new(config, composite_config, children)?))
}

fn build_adaptive(
    value: &Value,
    config: StrategyConfig,
) -> Result<Box<dyn Strategy>, EngineError> {
    let mut adaptive_value = value.clone();
    if let Some(object) = adaptive_value.as_object_mut() {
        object.remove("strategy");
        object.entry("initial").or_insert_with(|| "flat".into());
    }
    let adaptive_config: AdaptiveConfig = serde_json::from_value(adaptive_value)
        .map_err(|e| EngineError::config("adaptive", format!("bad adaptive config: {e}")))?;
    Ok(Box::new(Adaptive::new(config, adaptive_config)?))
}

fn wrap_parking(
    value: &Value,
    strategy: Box<dyn Strategy>,
) -> Result<Box<dyn Strategy>, EngineError> {
    match value.get("parking") {
        None | Some(Value::Bool(false)) => Ok(strategy),
        Some(Value::Bool(true)) => Ok(Box::new(Parking::new(
            ParkingConfig::default(),
            strategy,
        ))),
        Some(parking_value) => {
            let parking: ParkingConfig = serde_json::from_value(parking_value.clone())
                .map_err(|e| {
                    EngineError::config("parking", format!("bad parking config: {e}"))
                })?;
            Ok(Box::new(Parking::new(parking, strategy)))
        }
    }
}
