//! Composite strategy: k >= 2 children, one combination mode.
//!
//! Every child sees every update; only the combination decides what is
//! actually wagered. CONSENSUS without a bet-type majority emits a skip
//! with a `TOGGLE_BET_TYPE` action so the engine still makes progress
//! under the sequential-nonce constraint.

use dicelab_core::core::types::{AltAction, BetDecision, BetResult, BetType};
use dicelab_core::money::{dec_from_f64, round_money};
use dicelab_core::state::GameState;
use dicelab_core::strategy::{clamp_bet, Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the children's decisions are folded into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMode {
    /// Arithmetic mean of amounts; multiplier follows the first child
    Average,
    /// Confidence-weighted mean of amounts
    #[default]
    Weighted,
    /// Majority on bet type, mean amount of the agreeing children
    Consensus,
    /// Largest proposed amount wins
    Aggressive,
    /// Smallest proposed amount wins
    Conservative,
    /// Round-robin between children every `rotation_interval` bets
    Rotate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub mode: CombinationMode,
    /// Fraction of children that must agree on a bet type (CONSENSUS)
    pub consensus_threshold: f64,
    /// Bets between child switches (ROTATE)
    pub rotation_interval: u32,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            mode: CombinationMode::Weighted,
            consensus_threshold: 0.5,
            rotation_interval: 10,
        }
    }
}

#[derive(Debug)]
pub struct Composite {
    config: StrategyConfig,
    composite: CompositeConfig,
    children: Vec<Box<dyn Strategy>>,
    metrics: StrategyMetrics,
    confidence: f64,
    active_index: usize,
    bets_since_rotation: u32,
}

impl Composite {
    pub fn new(
        config: StrategyConfig,
        composite: CompositeConfig,
        children: Vec<Box<dyn Strategy>>,
    ) -> Result<Self, dicelab_core::EngineError> {
        if children.len() < 2 {
            return Err(dicelab_core::EngineError::config(
                "composite.strategies",
                "a composite needs at least two children",
            ));
        }
        Ok(Self {
            config,
            composite,
            children,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
            active_index: 0,
            bets_since_rotation: 0,
        })
    }

    fn combine(&mut self, state: &GameState) -> BetDecision {
        if self.composite.mode == CombinationMode::Rotate {
            return self.rotate_mode(state);
        }

        let decisions: Vec<BetDecision> = self
            .children
            .iter_mut()
            .map(|child| child.decide(state))
            .filter(|decision| !decision.skip)
            .collect();

        if decisions.is_empty() {
            return BetDecision::skip("no child produced a bet");
        }

        match self.composite.mode {
            CombinationMode::Average => self.average_mode(&decisions),
            CombinationMode::Weighted => self.weighted_mode(&decisions),
            CombinationMode::Consensus => self.consensus_mode(&decisions),
            CombinationMode::Aggressive => decisions
                .iter()
                .max_by(|a, b| a.amount.cmp(&b.amount))
                .cloned()
                .expect("non-empty"),
            CombinationMode::Conservative => decisions
                .iter()
                .min_by(|a, b| a.amount.cmp(&b.amount))
                .cloned()
                .expect("non-empty"),
            CombinationMode::Rotate => unreachable!("handled above"),
        }
    }

    fn average_mode(&self, decisions: &[BetDecision]) -> BetDecision {
        let count = Decimal::from(decisions.len());
        let amount =
            round_money(decisions.iter().map(|d| d.amount).sum::<Decimal>() / count);
        let confidence =
            decisions.iter().map(|d| d.confidence).sum::<f64>() / decisions.len() as f64;
        BetDecision::bet(
            amount,
            decisions[0].multiplier,
            majority_bet_type(decisions),
            confidence,
        )
    }

    fn weighted_mode(&self, decisions: &[BetDecision]) -> BetDecision {
        let total_confidence: f64 = decisions.iter().map(|d| d.confidence).sum();
        if total_confidence <= 0.0 {
            return self.average_mode(decisions);
        }
        let weighted_sum: Decimal = decisions
            .iter()
            .map(|d| {
                d.amount * dec_from_f64(d.confidence).unwrap_or(Decimal::ZERO)
            })
            .sum();
        let amount = round_money(
            weighted_sum / dec_from_f64(total_confidence).unwrap_or(Decimal::ONE),
        );
        BetDecision::bet(
            amount,
            decisions[0].multiplier,
            majority_bet_type(decisions),
            total_confidence / decisions.len() as f64,
        )
    }

    fn consensus_mode(&self, decisions: &[BetDecision]) -> BetDecision {
        let majority = majority_bet_type(decisions);
        let agreeing: Vec<&BetDecision> = decisions
            .iter()
            .filter(|d| d.bet_type == majority)
            .collect();
        let agreement = agreeing.len() as f64 / decisions.len() as f64;
        if agreement < self.composite.consensus_threshold {
            // No consensus: wait it out with a free toggle
            return BetDecision::toggle("no bet type consensus");
        }
        let count = Decimal::from(agreeing.len());
        let amount =
            round_money(agreeing.iter().map(|d| d.amount).sum::<Decimal>() / count);
        let confidence =
            agreeing.iter().map(|d| d.confidence).sum::<f64>() / agreeing.len() as f64;
        BetDecision::bet(amount, agreeing[0].multiplier, majority, confidence)
    }

    fn rotate_mode(&mut self, state: &GameState) -> BetDecision {
        let child = &mut self.children[self.active_index];
        let decision = child.decide(state);
        if decision.skip {
            return BetDecision::bet(
                self.config.base_bet,
                self.config.game_multiplier,
                self.config.bet_type,
                self.confidence,
            );
        }
        decision
    }
}

fn majority_bet_type(decisions: &[BetDecision]) -> BetType {
    let unders = decisions
        .iter()
        .filter(|d| d.bet_type == BetType::Under)
        .count();
    if unders * 2 >= decisions.len() {
        BetType::Under
    } else {
        BetType::Over
    }
}

impl Strategy for Composite {
    fn name(&self) -> String {
        let children: Vec<String> = self.children.iter().map(|c| c.name()).collect();
        format!(
            "Composite({:?})[{}]",
            self.composite.mode,
            children.join(",")
        )
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

    fn next_amount(&mut self, state: &GameState) -> Decimal {
        let decision = self.combine(state);
        if decision.skip {
            self.config.base_bet
        } else {
            decision.amount
        }
    }

    fn on_result(&mut self, _result: &BetResult) {}

    fn decide(&mut self, state: &GameState) -> BetDecision {
        self.fire_streak_hooks(state);
        if state.balance < self.config.min_bet {
            return BetDecision::skip("insufficient balance");
        }
        let mut decision = self.combine(state);
        if !decision.skip {
            decision.amount = clamp_bet(decision.amount, &self.config, state.balance);
            self.drift_confidence(state);
            decision.confidence = decision.confidence.min(1.0).max(0.0);
        }
        decision
    }

    /// Every child is fed every update, whichever of them won the vote.
    fn update(&mut self, result: &BetResult, state: &GameState) {
        for child in &mut self.children {
            child.update(result, state);
        }
        self.metrics.record(result, state);

        if self.composite.mode == CombinationMode::Rotate {
            self.bets_since_rotation += 1;
            if self.bets_since_rotation >= self.composite.rotation_interval {
                self.active_index = (self.active_index + 1) % self.children.len();
                self.bets_since_rotation = 0;
            }
        }
    }

    fn on_alt_action(&mut self, action: AltAction) {
        for child in &mut self.children {
            child.on_alt_action(action);
        }
    }

    fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
        self.active_index = 0;
        self.bets_since_rotation = 0;
        self.metrics.reset();
        self.confidence = 1.0;
    }

    fn on_winning_streak(&mut self, length: u32, state: &GameState) {
        for child in &mut self.children {
            child.on_winning_streak(length, state);
        }
    }

    fn on_losing_streak(&mut self, length: u32, state: &GameState) {
        for child in &mut self.children {
            child.on_losing_streak(length, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::Flat;
    use crate::martingale::Martingale;
    use crate::test_helpers::{apply, lost};
    use rust_decimal_macros::dec;

    fn children(flat_bet: Decimal, martingale_bet: Decimal) -> Vec<Box<dyn Strategy>> {
        vec![
            Box::new(Flat::new(StrategyConfig::with_base_bet(flat_bet))),
            Box::new(Martingale::new(StrategyConfig::with_base_bet(
                martingale_bet,
            ))),
        ]
    }

    fn composite(mode: CombinationMode) -> Composite {
        Composite::new(
            StrategyConfig::with_base_bet(dec!(0.001)),
            CompositeConfig {
                mode,
                ..CompositeConfig::default()
            },
            children(dec!(0.001), dec!(0.003)),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_two_children() {
        let single = vec![Box::new(Flat::new(StrategyConfig::default())) as Box<dyn Strategy>];
        assert!(Composite::new(
            StrategyConfig::default(),
            CompositeConfig::default(),
            single
        )
        .is_err());
    }

    #[test]
    fn test_average_mode() {
        let mut composite = composite(CombinationMode::Average);
        let state = GameState::new(dec!(100));
        let decision = composite.decide(&state);
        assert_eq!(decision.amount, dec!(0.002));
    }

    #[test]
    fn test_aggressive_and_conservative() {
        let state = GameState::new(dec!(100));
        let mut aggressive = composite(CombinationMode::Aggressive);
        assert_eq!(aggressive.decide(&state).amount, dec!(0.003));
        let mut conservative = composite(CombinationMode::Conservative);
        assert_eq!(conservative.decide(&state).amount, dec!(0.001));
    }

    #[test]
    fn test_weighted_follows_confidence() {
        let mut composite = composite(CombinationMode::Weighted);
        let state = GameState::new(dec!(100));
        // Equal confidences: same as the average
        let decision = composite.decide(&state);
        assert_eq!(decision.amount, dec!(0.002));
    }

    #[test]
    fn test_updates_fan_out_to_children() {
        let mut composite = composite(CombinationMode::Average);
        let mut state = GameState::new(dec!(100));
        apply(&mut composite, &mut state, &lost(dec!(0.002)));
        // The martingale child doubled: average of 0.001 and 0.006
        let decision = composite.decide(&state);
        assert_eq!(decision.amount, dec!(0.0035));
    }

    #[test]
    fn test_rotate_switches_children() {
        let mut composite = Composite::new(
            StrategyConfig::with_base_bet(dec!(0.001)),
            CompositeConfig {
                mode: CombinationMode::Rotate,
                rotation_interval: 2,
                ..CompositeConfig::default()
            },
            children(dec!(0.001), dec!(0.005)),
        )
        .unwrap();
        let mut state = GameState::new(dec!(100));

        // First child (flat) for two bets
        assert_eq!(composite.decide(&state).amount, dec!(0.001));
        apply(&mut composite, &mut state, &lost(dec!(0.001)));
        assert_eq!(composite.decide(&state).amount, dec!(0.001));
        apply(&mut composite, &mut state, &lost(dec!(0.001)));
        // Rotated to the martingale child, which has seen two losses
        assert_eq!(composite.decide(&state).amount, dec!(0.02));
    }

    #[test]
    fn test_consensus_toggles_without_majority() {
        // Children that disagree on bet type
        #[derive(Debug)]
        struct OverBetter(StrategyConfig, StrategyMetrics, f64);
        impl Strategy for OverBetter {
            fn name(&self) -> String {
                "OverBetter".into()
            }
            fn config(&self) -> &StrategyConfig {
                &self.0
            }
            fn metrics(&self) -> &StrategyMetrics {
                &self.1
            }
            fn metrics_mut(&mut self) -> &mut StrategyMetrics {
                &mut self.1
            }
            fn confidence(&self) -> f64 {
                self.2
            }
            fn set_confidence(&mut self, c: f64) {
                self.2 = c;
            }
            fn next_amount(&mut self, _s: &GameState) -> Decimal {
                self.0.base_bet
            }
            fn on_result(&mut self, _r: &BetResult) {}
            fn reset(&mut self) {}
            fn select_bet_type(&self, _s: &GameState) -> BetType {
                BetType::Over
            }
        }

        let over_config = StrategyConfig {
            bet_type: BetType::Over,
            ..StrategyConfig::with_base_bet(dec!(0.001))
        };
        let kids: Vec<Box<dyn Strategy>> = vec![
            Box::new(Flat::new(StrategyConfig::with_base_bet(dec!(0.001)))),
            Box::new(OverBetter(over_config, StrategyMetrics::default(), 1.0)),
        ];
        let mut composite = Composite::new(
            StrategyConfig::with_base_bet(dec!(0.001)),
            CompositeConfig {
                mode: CombinationMode::Consensus,
                consensus_threshold: 0.75,
                ..CompositeConfig::default()
            },
            kids,
        )
        .unwrap();

        let state = GameState::new(dec!(100));
        let decision = composite.decide(&state);
        assert!(decision.skip);
        assert_eq!(decision.action, Some(AltAction::ToggleBetType));
    }
}
