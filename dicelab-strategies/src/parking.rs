//! Parking wrapper: keeps the nonce stream moving when the base strategy
//! would rather not bet.
//!
//! The sequential-nonce constraint means "waiting" is never free for long.
//! When the base skips (or a losing streak / drawdown forces a pause), the
//! wrapper climbs a ladder of alternatives:
//!
//! 1. toggle UNDER/OVER - free, consumes no nonce, at most
//!    `max_toggles_before_bet` times in a row;
//! 2. rotate seeds - also free, taken when the epoch has seen at least
//!    `auto_seed_rotation_after` bets;
//! 3. a parking bet - minimum amount at a ~97% win chance, consuming the
//!    nonce the platform insists on.

use dicelab_core::config::ParkingConfig;
use dicelab_core::core::types::{AltAction, BetDecision, BetResult};
use dicelab_core::money::dec_from_f64;
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics};
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct Parking {
    config: StrategyConfig,
    parking: ParkingConfig,
    base: Box<dyn Strategy>,
    metrics: StrategyMetrics,
    confidence: f64,
    toggle_count: u32,
    bets_since_rotation: u32,
    /// Drawdown trigger as an exact decimal
    drawdown_trigger: Decimal,
}

impl Parking {
    pub fn new(parking: ParkingConfig, base: Box<dyn Strategy>) -> Self {
        let config = *base.config();
        let drawdown_trigger =
            dec_from_f64(parking.parking_on_drawdown_percent).unwrap_or(Decimal::ONE);
        Self {
            config,
            parking,
            base,
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
            toggle_count: 0,
            bets_since_rotation: 0,
            drawdown_trigger,
        }
    }

    pub fn toggle_count(&self) -> u32 {
        self.toggle_count
    }

    /// Spontaneous parking: the wrapper pauses the base even though it did
    /// not ask to skip.
    fn should_park(&self, state: &GameState) -> bool {
        state.consecutive_losses() >= self.parking.parking_on_consecutive_losses
            || state.current_drawdown >= self.drawdown_trigger
    }

    /// The ladder: toggle while allowed, rotate a stale epoch, else pay
    /// for a parking bet.
    fn park(&mut self, state: &GameState) -> BetDecision {
        if self.toggle_count < self.parking.max_toggles_before_bet {
            self.toggle_count += 1;
            return BetDecision::toggle(format!(
                "parking toggle {}/{}",
                self.toggle_count, self.parking.max_toggles_before_bet
            ));
        }
        if self.bets_since_rotation >= self.parking.auto_seed_rotation_after {
            self.toggle_count = 0;
            return BetDecision::rotate("parking seed rotation");
        }
        self.toggle_count = 0;
        BetDecision::parking(
            self.parking.parking_bet_amount,
            100.0 / self.parking.parking_target,
            state.current_bet_type,
        )
    }
}

impl Strategy for Parking {
    fn name(&self) -> String {
        format!("Parking({})", self.base.name())
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
        self.base.next_amount(state)
    }

    fn on_result(&mut self, _result: &BetResult) {}

    fn decide(&mut self, state: &GameState) -> BetDecision {
        if self.should_park(state) {
            return self.park(state);
        }
        let decision = self.base.decide(state);
        self.confidence = self.base.confidence();
        if decision.skip && decision.action.is_none() {
            // Base wants to wait: the wrapper decides how
            return self.park(state);
        }
        self.toggle_count = 0;
        decision
    }

    fn update(&mut self, result: &BetResult, state: &GameState) {
        self.base.update(result, state);
        self.metrics.record(result, state);
        self.bets_since_rotation += 1;
    }

    fn on_alt_action(&mut self, action: AltAction) {
        if action == AltAction::RotateSeed {
            self.bets_since_rotation = 0;
        }
        self.base.on_alt_action(action);
    }

    fn reset(&mut self) {
        self.base.reset();
        self.toggle_count = 0;
        self.bets_since_rotation = 0;
        self.metrics.reset();
        self.confidence = 1.0;
    }

    fn on_winning_streak(&mut self, length: u32, state: &GameState) {
        self.base.on_winning_streak(length, state);
    }

    fn on_losing_streak(&mut self, length: u32, state: &GameState) {
        self.base.on_losing_streak(length, state);
    }
}
