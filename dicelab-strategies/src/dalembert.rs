//! D'Alembert: add one unit after a loss, remove one after a win.
//!
//! Linear progression; the unit is the base bet and `max_losses` caps the
//! number of units.

use dicelab_core::core::types::BetResult;
use dicelab_core::money::round_money;
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct DAlembert {
    config: StrategyConfig,
    metrics: StrategyMetrics,
    confidence: f64,
    units: u32,
}

impl DAlembert {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
            units: 1,
        }
    }

    pub fn units(&self) -> u32 {
        self.units
    }
}

impl Strategy for DAlembert {
    fn name(&self) -> String {
        "DAlembert".into()
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
        round_money(self.config.base_bet * Decimal::from(self.units))
    }

    fn on_result(&mut self, result: &BetResult) {
        if result.won {
            self.units = self.units.saturating_sub(1).max(1);
        } else {
            self.units = (self.units + 1).min(self.config.max_losses.max(1));
        }
    }

    fn reset(&mut self) {
        self.units = 1;
        self.metrics.reset();
        self.confidence = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{apply, lost, won};
    use rust_decimal_macros::dec;

    fn dalembert(max_losses: u32) -> DAlembert {
        DAlembert::new(StrategyConfig {
            base_bet: dec!(0.001),
            max_losses,
            ..StrategyConfig::default()
        })
    }

    #[test]
    fn test_linear_progression() {
        let mut strategy = dalembert(10);
        let mut state = GameState::new(dec!(100));

        assert_eq!(strategy.next_amount(&state), dec!(0.001));
        apply(&mut strategy, &mut state, &lost(dec!(0.001)));
        assert_eq!(strategy.next_amount(&state), dec!(0.002));
        apply(&mut strategy, &mut state, &lost(dec!(0.002)));
        assert_eq!(strategy.next_amount(&state), dec!(0.003));

        apply(&mut strategy, &mut state, &won(dec!(0.003), 2.0));
        assert_eq!(strategy.next_amount(&state), dec!(0.002));
    }

    #[test]
    fn test_never_below_one_unit() {
        let mut strategy = dalembert(10);
        let mut state = GameState::new(dec!(100));
        for _ in 0..5 {
            apply(&mut strategy, &mut state, &won(dec!(0.001), 2.0));
        }
        assert_eq!(strategy.units(), 1);
        assert_eq!(strategy.next_amount(&state), dec!(0.001));
    }

    #[test]
    fn test_units_capped_by_max_losses() {
        let mut strategy = dalembert(5);
        let mut state = GameState::new(dec!(100));
        for _ in 0..12 {
            let bet = strategy.next_amount(&state);
            apply(&mut strategy, &mut state, &lost(bet));
        }
        assert_eq!(strategy.units(), 5);
        assert_eq!(strategy.next_amount(&state), dec!(0.005));
    }
}
