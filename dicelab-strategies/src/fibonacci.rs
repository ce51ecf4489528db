//! Fibonacci progression: advance one step on a loss, retreat two on a win.
//!
//! Slower than Martingale because the sequence grows sub-exponentially and
//! a single win unwinds two steps. `max_losses` truncates the sequence.

use dicelab_core::core::types::BetResult;
use dicelab_core::money::round_money;
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;

const FIB: [u64; 15] = [1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 610];

#[derive(Debug)]
pub struct Fibonacci {
    config: StrategyConfig,
    metrics: StrategyMetrics,
    confidence: f64,
    sequence: Vec<u64>,
    index: usize,
}

impl Fibonacci {
    pub fn new(config: StrategyConfig) -> Self {
        let depth = (config.max_losses as usize).clamp(1, FIB.len());
        Self {
            config,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
            sequence: FIB[..depth].to_vec(),
            index: 0,
        }
    }

    pub fn level(&self) -> usize {
        self.index
    }

    pub fn sequence_value(&self) -> u64 {
        self.sequence[self.index]
    }
}

impl Strategy for Fibonacci {
    fn name(&self) -> String {
        "Fibonacci".into()
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
        round_money(self.config.base_bet * Decimal::from(self.sequence[self.index]))
    }

    fn on_result(&mut self, result: &BetResult) {
        if result.won {
            self.index = self.index.saturating_sub(2);
        } else {
            self.index = (self.index + 1).min(self.sequence.len() - 1);
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.metrics.reset();
        self.confidence = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{apply, lost, won};
    use rust_decimal_macros::dec;

    fn fibonacci(max_losses: u32) -> Fibonacci {
        Fibonacci::new(StrategyConfig {
            base_bet: dec!(0.001),
            max_losses,
            ..StrategyConfig::default()
        })
    }

    #[test]
    fn test_walks_the_sequence_on_losses() {
        let mut strategy = fibonacci(10);
        let mut state = GameState::new(dec!(100));

        let expected = [dec!(0.001), dec!(0.001), dec!(0.002), dec!(0.003), dec!(0.005)];
        for bet in expected {
            assert_eq!(strategy.next_amount(&state), bet);
            apply(&mut strategy, &mut state, &lost(bet));
        }
        assert_eq!(strategy.next_amount(&state), dec!(0.008));
    }

    #[test]
    fn test_win_retreats_two_levels() {
        let mut strategy = fibonacci(10);
        let mut state = GameState::new(dec!(100));
        for _ in 0..5 {
            let bet = strategy.next_amount(&state);
            apply(&mut strategy, &mut state, &lost(bet));
        }
        assert_eq!(strategy.level(), 5);
        apply(&mut strategy, &mut state, &won(dec!(0.008), 2.0));
        assert_eq!(strategy.level(), 3);
        // Winning near the start floors at level zero
        apply(&mut strategy, &mut state, &won(dec!(0.003), 2.0));
        apply(&mut strategy, &mut state, &won(dec!(0.001), 2.0));
        assert_eq!(strategy.level(), 0);
    }

    #[test]
    fn test_sequence_truncated_by_max_losses() {
        let mut strategy = fibonacci(4);
        let mut state = GameState::new(dec!(100));
        for _ in 0..10 {
            let bet = strategy.next_amount(&state);
            apply(&mut strategy, &mut state, &lost(bet));
        }
        // Pinned at the truncated top: fib[3] = 3
        assert_eq!(strategy.level(), 3);
        assert_eq!(strategy.next_amount(&state), dec!(0.003));
    }
}
