//! Flat betting: the same amount every time. The baseline every other
//! strategy is compared against.

use dicelab_core::core::types::BetResult;
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct Flat {
    config: StrategyConfig,
    metrics: StrategyMetrics,
    confidence: f64,
}

impl Flat {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
        }
    }
}

impl Strategy for Flat {
    fn name(&self) -> String {
        "Flat".into()
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
        self.config.base_bet
    }

    fn on_result(&mut self, _result: &BetResult) {}

    fn reset(&mut self) {
        self.metrics.reset();
        self.confidence = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{apply, lost, won};
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_never_moves() {
        let mut flat = Flat::new(StrategyConfig::with_base_bet(dec!(0.002)));
        let mut state = GameState::new(dec!(10));

        assert_eq!(flat.next_amount(&state), dec!(0.002));
        apply(&mut flat, &mut state, &lost(dec!(0.002)));
        assert_eq!(flat.next_amount(&state), dec!(0.002));
        apply(&mut flat, &mut state, &won(dec!(0.002), 2.0));
        assert_eq!(flat.next_amount(&state), dec!(0.002));
    }

    #[test]
    fn test_decide_clamps_to_balance() {
        let mut flat = Flat::new(StrategyConfig::with_base_bet(dec!(5)));
        let state = GameState::new(dec!(2));
        let decision = flat.decide(&state);
        assert!(!decision.skip);
        assert_eq!(decision.amount, dec!(2));
    }
}
