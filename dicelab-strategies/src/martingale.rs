//! Martingale: multiply the bet after every loss, reset to base on a win.
//!
//! The classic ruin machine. `max_losses` caps the progression: once that
//! many consecutive losses accumulate, the next bet resets to the base bet
//! instead of doubling again.

use dicelab_core::core::types::BetResult;
use dicelab_core::money::{dec_from_f64, round_money};
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;
use tracing::debug;

#[derive(Debug)]
pub struct Martingale {
    config: StrategyConfig,
    metrics: StrategyMetrics,
    confidence: f64,
    consecutive_losses: u32,
    /// `config.multiplier` as an exact decimal
    factor: Decimal,
}

impl Martingale {
    pub fn new(config: StrategyConfig) -> Self {
        let factor = dec_from_f64(config.multiplier).unwrap_or(Decimal::TWO);
        Self {
            config,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
            consecutive_losses: 0,
            factor,
        }
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }
}

impl Strategy for Martingale {
    fn name(&self) -> String {
        "Martingale".into()
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
        if self.consecutive_losses >= self.config.max_losses {
            // Progression capped: back to base until a win clears the streak
            debug!(
                losses = self.consecutive_losses,
                cap = self.config.max_losses,
                "martingale capped, betting base"
            );
            return self.config.base_bet;
        }
        let mut bet = self.config.base_bet;
        for _ in 0..self.consecutive_losses {
            bet *= self.factor;
        }
        round_money(bet)
    }

    fn on_result(&mut self, result: &BetResult) {
        if result.won {
            self.consecutive_losses = 0;
        } else {
            self.consecutive_losses += 1;
        }
    }

    fn reset(&mut self) {
        self.consecutive_losses = 0;
        self.metrics.reset();
        self.confidence = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{apply, lost, won};
    use rust_decimal_macros::dec;

    fn martingale(max_losses: u32) -> Martingale {
        Martingale::new(StrategyConfig {
            base_bet: dec!(0.001),
            max_losses,
            ..StrategyConfig::default()
        })
    }

    #[test]
    fn test_doubles_after_each_loss() {
        let mut strategy = martingale(10);
        let mut state = GameState::new(dec!(100));

        assert_eq!(strategy.next_amount(&state), dec!(0.001));
        apply(&mut strategy, &mut state, &lost(dec!(0.001)));
        assert_eq!(strategy.next_amount(&state), dec!(0.002));
        apply(&mut strategy, &mut state, &lost(dec!(0.002)));
        assert_eq!(strategy.next_amount(&state), dec!(0.004));
        apply(&mut strategy, &mut state, &lost(dec!(0.004)));
        assert_eq!(strategy.next_amount(&state), dec!(0.008));
    }

    #[test]
    fn test_resets_on_win() {
        let mut strategy = martingale(10);
        let mut state = GameState::new(dec!(100));
        for _ in 0..3 {
            apply(&mut strategy, &mut state, &lost(dec!(0.001)));
        }
        apply(&mut strategy, &mut state, &won(dec!(0.008), 2.0));
        assert_eq!(strategy.next_amount(&state), dec!(0.001));
    }

    #[test]
    fn test_cap_resets_to_base() {
        let mut strategy = martingale(10);
        let mut state = GameState::new(dec!(1_000_000));
        let mut max_bet = Decimal::ZERO;
        for _ in 0..10 {
            let bet = strategy.next_amount(&state);
            max_bet = max_bet.max(bet);
            apply(&mut strategy, &mut state, &lost(bet));
        }
        // After max_losses consecutive losses the next bet is exactly base
        assert_eq!(strategy.next_amount(&state), dec!(0.001));
        // And no bet along the way exceeded base * 2^10
        assert!(max_bet <= dec!(0.001) * dec!(1024));
    }

    #[test]
    fn test_non_double_multiplier() {
        let mut strategy = Martingale::new(StrategyConfig {
            base_bet: dec!(0.001),
            multiplier: 1.5,
            max_losses: 10,
            ..StrategyConfig::default()
        });
        let mut state = GameState::new(dec!(100));
        apply(&mut strategy, &mut state, &lost(dec!(0.001)));
        assert_eq!(strategy.next_amount(&state), dec!(0.0015));
        apply(&mut strategy, &mut state, &lost(dec!(0.0015)));
        assert_eq!(strategy.next_amount(&state), dec!(0.00225));
    }
}
