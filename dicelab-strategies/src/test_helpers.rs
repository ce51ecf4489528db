//! Shared builders for strategy tests.

use chrono::Utc;
use dicelab_core::core::types::{BetResult, BetType};
use dicelab_core::money::mul_rate;
use dicelab_core::state::GameState;
use rust_decimal::Decimal;

/// A winning bet at the given amount and payout multiplier.
pub fn won(amount: Decimal, multiplier: f64) -> BetResult {
    BetResult {
        roll: 10.0,
        threshold: 49.5,
        won: true,
        amount,
        multiplier,
        payout: mul_rate(amount, multiplier),
        bet_type: BetType::Under,
        server_seed_hash: String::new(),
        client_seed: String::new(),
        nonce: 0,
        timestamp: Utc::now(),
    }
}

/// A losing bet at the given amount.
pub fn lost(amount: Decimal) -> BetResult {
    BetResult {
        roll: 90.0,
        threshold: 49.5,
        won: false,
        amount,
        multiplier: 2.0,
        payout: Decimal::ZERO,
        bet_type: BetType::Under,
        server_seed_hash: String::new(),
        client_seed: String::new(),
        nonce: 0,
        timestamp: Utc::now(),
    }
}

/// Feed a result through both a state and a strategy, like the engine does.
pub fn apply(
    strategy: &mut dyn dicelab_core::strategy::Strategy,
    state: &mut GameState,
    result: &BetResult,
) {
    state.update(result);
    strategy.update(result, state);
}

/// A state that has just seen `n` consecutive losses of `amount`.
pub fn state_after_losses(balance: Decimal, n: u32, amount: Decimal) -> GameState {
    let mut state = GameState::new(balance);
    for _ in 0..n {
        state.update(&lost(amount));
    }
    state
}
