//! Strategy framework: the `Strategy` trait, shared config, metrics
//! accrual, confidence drift and the hook set.
//!
//! Concrete strategies implement the small required surface (`next_amount`,
//! `on_result`, `reset`, accessors) and inherit the framework behavior from
//! the default methods: streak hooks, bet clamping, confidence updates and
//! metric accrual. Composite, adaptive and parking strategies override
//! `decide` wholesale.
//!
//! Dynamic dispatch (`Box<dyn Strategy>`) is deliberate: combinators hold
//! heterogeneous children, so the closed set of implementations is reached
//! through one object-safe trait.

use crate::core::types::{AltAction, BetDecision, BetResult, BetType};
use crate::state::GameState;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Floor of the confidence band.
pub const MIN_CONFIDENCE: f64 = 0.1;
/// Drawdown ratio above which confidence decays faster.
const CONFIDENCE_DRAWDOWN_TRIGGER: Decimal = dec!(0.1);

/// Tunables shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub base_bet: Decimal,
    pub min_bet: Decimal,
    pub max_bet: Decimal,
    /// Progression multiplier (Martingale doubling factor etc.)
    pub multiplier: f64,
    /// Progression cap: consecutive losses / steps / sequence depth
    pub max_losses: u32,
    /// Payout multiplier requested from the game
    pub game_multiplier: f64,
    pub bet_type: BetType,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            base_bet: dec!(0.001),
            min_bet: dec!(0.00015),
            max_bet: dec!(1000),
            multiplier: 2.0,
            max_losses: 10,
            game_multiplier: 2.0,
            bet_type: BetType::Under,
        }
    }
}

impl StrategyConfig {
    pub fn with_base_bet(base_bet: Decimal) -> Self {
        Self {
            base_bet,
            ..Self::default()
        }
    }
}

/// Live performance metrics, maintained by the framework.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub total_bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_wagered: Decimal,
    pub total_profit: Decimal,
    pub max_bet_seen: Decimal,
    pub max_consecutive_losses: u32,
    pub current_drawdown: Decimal,
    pub max_drawdown: Decimal,
    // Running moments of the per-bet return, for the fitness score
    return_sum: f64,
    return_sq_sum: f64,
}

impl StrategyMetrics {
    /// Fold one result into the metrics.
    pub fn record(&mut self, result: &BetResult, state: &GameState) {
        self.total_bets += 1;
        self.total_wagered += result.amount;
        if result.won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.total_profit += result.profit();
        self.max_bet_seen = self.max_bet_seen.max(result.amount);
        self.max_consecutive_losses = self
            .max_consecutive_losses
            .max(state.consecutive_losses());
        self.current_drawdown = state.current_drawdown;
        self.max_drawdown = self.max_drawdown.max(state.current_drawdown);

        if !result.amount.is_zero() {
            let ret = (result.profit() / result.amount).to_f64().unwrap_or(0.0);
            self.return_sum += ret;
            self.return_sq_sum += ret * ret;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_bets == 0 {
            return 0.0;
        }
        self.wins as f64 / self.total_bets as f64
    }

    pub fn roi(&self) -> f64 {
        if self.total_wagered.is_zero() {
            return 0.0;
        }
        (self.total_profit / self.total_wagered)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Mean per-bet return over its standard deviation (plus epsilon).
    /// Reported for ranking; never gates execution.
    pub fn fitness_score(&self) -> f64 {
        if self.total_bets < 2 {
            return 0.0;
        }
        let n = self.total_bets as f64;
        let mean = self.return_sum / n;
        let variance = (self.return_sq_sum / n - mean * mean).max(0.0);
        mean / (variance.sqrt() + 1e-9)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A strategy switch performed by the adaptive layer, drained by the engine
/// for `STRATEGY_SWITCH` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchRecord {
    pub from: String,
    pub to: String,
    pub condition: String,
    pub at_bet: u64,
}

/// The betting strategy interface.
pub trait Strategy: Send + std::fmt::Debug {
    /// Display name, e.g. `"Martingale"` or `"Parking(Fibonacci)"`.
    fn name(&self) -> String;

    fn config(&self) -> &StrategyConfig;
    fn metrics(&self) -> &StrategyMetrics;
    fn metrics_mut(&mut self) -> &mut StrategyMetrics;
    fn confidence(&self) -> f64;
    fn set_confidence(&mut self, confidence: f64);

    /// Progression rule: the raw amount for the next bet, before clamping.
    fn next_amount(&mut self, state: &GameState) -> Decimal;

    /// Progression bookkeeping after a resolved bet.
    fn on_result(&mut self, result: &BetResult);

    /// Return to the initial progression. Called between sessions.
    fn reset(&mut self);

    /// Decide the next action. The default covers simple progressions;
    /// combinators override it.
    fn decide(&mut self, state: &GameState) -> BetDecision {
        self.fire_streak_hooks(state);

        let cfg = *self.config();
        if state.balance < cfg.min_bet {
            return BetDecision::skip("insufficient balance");
        }

        self.on_before_decision(state);
        let raw = self.next_amount(state);
        let amount = clamp_bet(raw, &cfg, state.balance);
        if amount < cfg.min_bet {
            return BetDecision::skip("bet below minimum after limits");
        }

        self.drift_confidence(state);

        let decision = BetDecision::bet(
            amount,
            self.select_multiplier(state),
            self.select_bet_type(state),
            self.confidence(),
        )
        .with_meta("strategy", json!(self.name()))
        .with_meta("consecutive_losses", json!(state.consecutive_losses()))
        .with_meta("consecutive_wins", json!(state.consecutive_wins()));

        self.on_after_decision(&decision, state);
        decision
    }

    /// Framework-side update: progression first, then metric accrual.
    /// The driver invokes this after every bet.
    fn update(&mut self, result: &BetResult, state: &GameState) {
        self.on_result(result);
        self.metrics_mut().record(result, state);
        if state.current_drawdown >= CONFIDENCE_DRAWDOWN_TRIGGER {
            self.on_drawdown(state.current_drawdown, state);
        }
    }

    /// Observe a non-bet action the engine performed on the strategy's
    /// behalf (toggle, rotation) so internal state stays consistent.
    fn on_alt_action(&mut self, _action: AltAction) {}

    /// Serialized tunables for later reproduction.
    fn genome(&self) -> serde_json::Map<String, serde_json::Value> {
        let cfg = self.config();
        let mut genome = serde_json::Map::new();
        genome.insert("strategy".into(), json!(self.name()));
        genome.insert("base_bet".into(), json!(cfg.base_bet.to_string()));
        genome.insert("multiplier".into(), json!(cfg.multiplier));
        genome.insert("max_losses".into(), json!(cfg.max_losses));
        genome.insert("game_multiplier".into(), json!(cfg.game_multiplier));
        genome.insert("bet_type".into(), json!(cfg.bet_type.as_str()));
        genome.insert("confidence".into(), json!(self.confidence()));
        genome.insert("fitness".into(), json!(self.metrics().fitness_score()));
        genome
    }

    /// Side the next bet takes; defaults to the configured side.
    fn select_bet_type(&self, _state: &GameState) -> BetType {
        self.config().bet_type
    }

    /// Payout multiplier requested; defaults to the configured one.
    fn select_multiplier(&self, _state: &GameState) -> f64 {
        self.config().game_multiplier
    }

    /// Pending switch performed since the last drain (adaptive only).
    fn take_switch(&mut self) -> Option<SwitchRecord> {
        None
    }

    // --- hooks fired by the framework, not by concrete strategies ---

    fn on_before_decision(&mut self, _state: &GameState) {}
    fn on_after_decision(&mut self, _decision: &BetDecision, _state: &GameState) {}
    fn on_winning_streak(&mut self, _length: u32, _state: &GameState) {}
    fn on_losing_streak(&mut self, _length: u32, _state: &GameState) {}
    fn on_drawdown(&mut self, _ratio: Decimal, _state: &GameState) {}

    /// Invoke the streak hooks when a run of 3+ is in progress.
    fn fire_streak_hooks(&mut self, state: &GameState) {
        let wins = state.consecutive_wins();
        if wins >= 3 {
            self.on_winning_streak(wins, state);
        }
        let losses = state.consecutive_losses();
        if losses >= 3 {
            self.on_losing_streak(losses, state);
        }
    }

    /// Confidence drifts down on losing streaks, up on winning streaks,
    /// decays further past 10% drawdown; always clamped to [0.1, 1.0].
    fn drift_confidence(&mut self, state: &GameState) {
        let mut confidence = self.confidence();
        let losses = state.consecutive_losses();
        if losses > 0 {
            confidence *= 0.95_f64.powi(losses as i32);
        } else if state.consecutive_wins() > 0 {
            confidence = (confidence * 1.05).min(1.0);
        }
        if state.current_drawdown > CONFIDENCE_DRAWDOWN_TRIGGER {
            confidence *= 0.9;
        }
        self.set_confidence(confidence.clamp(MIN_CONFIDENCE, 1.0));
    }
}

/// Clamp a bet into `[min_bet, min(max_bet, balance)]`.
pub fn clamp_bet(amount: Decimal, config: &StrategyConfig, balance: Decimal) -> Decimal {
    amount
        .max(config.min_bet)
        .min(config.max_bet)
        .min(balance)
}
