//! Paroli: the anti-Martingale. Press the bet after wins, reset after a
//! loss or after `target_wins` consecutive wins bank the run.

use dicelab_core::core::types::BetResult;
use dicelab_core::money::{dec_from_f64, round_money};
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;

/// Consecutive wins banked before the run resets.
pub const DEFAULT_TARGET_WINS: u32 = 3;

#[derive(Debug)]
pub struct Paroli {
    config: StrategyConfig,
    metrics: StrategyMetrics,
    confidence: f64,
    target_wins: u32,
    consecutive_wins: u32,
    last_bet: Decimal,
    factor: Decimal,
}

impl Paroli {
    pub fn new(config: StrategyConfig) -> Self {
        Self::with_target_wins(config, DEFAULT_TARGET_WINS)
    }

    pub fn with_target_wins(config: StrategyConfig, target_wins: u32) -> Self {
        let factor = dec_from_f64(config.multiplier).unwrap_or(Decimal::TWO);
        Self {
            last_bet: config.base_bet,
            config,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
            target_wins: target_wins.max(1),
            consecutive_wins: 0,
            factor,
        }
    }

    pub fn consecutive_wins(&self) -> u32 {
        self.consecutive_wins
    }
}

impl Strategy for Paroli {
    fn name(&self) -> String {
        "Paroli".into()
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
        if self.consecutive_wins == 0 || self.consecutive_wins >= self.target_wins {
            self.config.base_bet
        } else {
            round_money(self.last_bet * self.factor)
        }
    }

    fn on_result(&mut self, result: &BetResult) {
        if result.won {
            self.consecutive_wins += 1;
            if self.consecutive_wins >= self.target_wins {
                // Run banked; next amount resets and the count restarts
                self.consecutive_wins = 0;
            }
        } else {
            self.consecutive_wins = 0;
        }
        self.last_bet = result.amount;
    }

    fn reset(&mut self) {
        self.consecutive_wins = 0;
        self.last_bet = self.config.base_bet;
        self.metrics.reset();
        self.confidence = 1.0;
    }
}
