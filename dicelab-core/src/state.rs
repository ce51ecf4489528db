//! Rolling per-session game state: balance, streaks, drawdown, history.

use crate::core::types::{BetResult, BetType};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default rolling history window.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Hard cap on the configurable history window.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Mutable state of one session's bankroll and telemetry.
///
/// `current_streak` is signed: `+n` after n consecutive wins, `-n` after n
/// consecutive losses, `0` before the first bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub balance: Decimal,
    pub bets_count: u64,
    pub wins_count: u64,
    pub losses_count: u64,
    pub total_wagered: Decimal,
    pub total_profit: Decimal,

    pub current_streak: i64,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,

    pub peak_balance: Decimal,
    pub trough_balance: Decimal,
    /// Fractional drawdown from the peak, in [0, 1]
    pub current_drawdown: Decimal,
    pub max_drawdown: Decimal,

    /// Rolling window of recent results (bounded by `history_limit`)
    #[serde(skip)]
    pub bet_history: VecDeque<BetResult>,
    pub history_limit: usize,

    /// Side the next parking/toggled bet would take
    pub current_bet_type: BetType,

    // Parking / provably-fair telemetry
    pub parking_bets_count: u64,
    pub parking_losses: Decimal,
    pub seed_rotations_count: u64,
    pub bet_type_toggles: u64,

    pub session_start_balance: Decimal,
    pub session_start_time: DateTime<Utc>,
}

impl GameState {
    pub fn new(balance: Decimal) -> Self {
        Self::with_history_limit(balance, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(balance: Decimal, history_limit: usize) -> Self {
        let history_limit = history_limit.clamp(1, MAX_HISTORY_LIMIT);
        Self {
            balance,
            bets_count: 0,
            wins_count: 0,
            losses_count: 0,
            total_wagered: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            current_streak: 0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            peak_balance: balance,
            trough_balance: balance,
            current_drawdown: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            bet_history: VecDeque::with_capacity(history_limit),
            history_limit,
            current_bet_type: BetType::Under,
            parking_bets_count: 0,
            parking_losses: Decimal::ZERO,
            seed_rotations_count: 0,
            bet_type_toggles: 0,
            session_start_balance: balance,
            session_start_time: Utc::now(),
        }
    }

    /// Fold one resolved bet into the state.
    pub fn update(&mut self, result: &BetResult) {
        self.bets_count += 1;
        self.total_wagered += result.amount;

        if self.bet_history.len() == self.history_limit {
            self.bet_history.pop_front();
        }
        self.bet_history.push_back(result.clone());

        let profit = result.profit();
        self.balance += profit;
        self.total_profit += profit;

        if result.won {
            self.wins_count += 1;
            self.current_streak = self.current_streak.max(0) + 1;
            self.max_consecutive_wins =
                self.max_consecutive_wins.max(self.current_streak as u32);
        } else {
            self.losses_count += 1;
            self.current_streak = self.current_streak.min(0) - 1;
            self.max_consecutive_losses =
                self.max_consecutive_losses.max((-self.current_streak) as u32);
        }

        self.peak_balance = self.peak_balance.max(self.balance);
        self.trough_balance = self.trough_balance.min(self.balance);

        if self.balance < self.peak_balance && self.peak_balance > Decimal::ZERO {
            self.current_drawdown = (self.peak_balance - self.balance) / self.peak_balance;
            self.max_drawdown = self.max_drawdown.max(self.current_drawdown);
        } else {
            self.current_drawdown = Decimal::ZERO;
        }
    }

    pub fn consecutive_wins(&self) -> u32 {
        self.current_streak.max(0) as u32
    }

    pub fn consecutive_losses(&self) -> u32 {
        (-self.current_streak.min(0)) as u32
    }

    pub fn win_rate(&self) -> f64 {
        if self.bets_count == 0 {
            return 0.0;
        }
        self.wins_count as f64 / self.bets_count as f64
    }

    /// Profit over total wagered.
    pub fn roi(&self) -> f64 {
        if self.total_wagered.is_zero() {
            return 0.0;
        }
        (self.total_profit / self.total_wagered)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Session profit over the starting balance.
    pub fn session_roi(&self) -> f64 {
        if self.session_start_balance.is_zero() {
            return 0.0;
        }
        ((self.balance - self.session_start_balance) / self.session_start_balance)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Simplified Sharpe over the rolling window: mean per-bet return over
    /// its sample standard deviation.
    pub fn sharpe_ratio(&self) -> f64 {
        if self.bet_history.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = self
            .bet_history
            .iter()
            .filter(|r| !r.amount.is_zero())
            .map(|r| (r.profit() / r.amount).to_f64().unwrap_or(0.0))
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (returns.len() - 1) as f64;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return 0.0;
        }
        mean / std_dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn result(won: bool, amount: Decimal, multiplier: f64) -> BetResult {
        BetResult {
            roll: if won { 10.0 } else { 90.0 },
            threshold: 49.5,
            won,
            amount,
            multiplier,
            payout: if won {
                crate::money::mul_rate(amount, multiplier)
            } else {
                Decimal::ZERO
            },
            bet_type: BetType::Under,
            server_seed_hash: String::new(),
            client_seed: String::new(),
            nonce: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_balance_and_counts_track_results() {
        let mut state = GameState::new(dec!(10));
        state.update(&result(true, dec!(1), 2.0));
        assert_eq!(state.balance, dec!(11));
        assert_eq!(state.wins_count, 1);

        state.update(&result(false, dec!(1), 2.0));
        assert_eq!(state.balance, dec!(10));
        assert_eq!(state.losses_count, 1);
        assert_eq!(state.total_wagered, dec!(2));
        assert_eq!(state.total_profit, dec!(0));
    }

    #[test]
    fn test_signed_streak() {
        let mut state = GameState::new(dec!(10));
        state.update(&result(true, dec!(0.1), 2.0));
        state.update(&result(true, dec!(0.1), 2.0));
        assert_eq!(state.current_streak, 2);
        assert_eq!(state.consecutive_wins(), 2);
        assert_eq!(state.consecutive_losses(), 0);

        state.update(&result(false, dec!(0.1), 2.0));
        state.update(&result(false, dec!(0.1), 2.0));
        state.update(&result(false, dec!(0.1), 2.0));
        assert_eq!(state.current_streak, -3);
        assert_eq!(state.consecutive_losses(), 3);
        assert_eq!(state.max_consecutive_wins, 2);
        assert_eq!(state.max_consecutive_losses, 3);
    }

    #[test]
    fn test_drawdown_from_peak() {
        let mut state = GameState::new(dec!(100));
        state.update(&result(true, dec!(10), 2.0)); // 110
        state.update(&result(false, dec!(11), 2.0)); // 99
        assert_eq!(state.peak_balance, dec!(110));
        assert_eq!(state.current_drawdown, dec!(0.1));
        assert_eq!(state.max_drawdown, dec!(0.1));

        // Recovery clears current drawdown but not the max
        state.update(&result(true, dec!(11), 2.0)); // 110
        assert_eq!(state.current_drawdown, dec!(0));
        assert_eq!(state.max_drawdown, dec!(0.1));
    }

    #[test]
    fn test_history_window_is_bounded() {
        let mut state = GameState::with_history_limit(dec!(100), 5);
        for _ in 0..12 {
            state.update(&result(false, dec!(0.001), 2.0));
        }
        assert_eq!(state.bet_history.len(), 5);
        assert_eq!(state.bets_count, 12);

        // Limit clamps to the hard cap
        let wide = GameState::with_history_limit(dec!(1), 500);
        assert_eq!(wide.history_limit, MAX_HISTORY_LIMIT);
    }

    #[test]
    fn test_sharpe_sign_follows_results() {
        let mut winner = GameState::new(dec!(100));
        for i in 0..10 {
            winner.update(&result(i % 4 != 0, dec!(1), 2.0));
        }
        assert!(winner.sharpe_ratio() > 0.0);

        let mut loser = GameState::new(dec!(100));
        for i in 0..10 {
            loser.update(&result(i % 4 == 0, dec!(1), 2.0));
        }
        assert!(loser.sharpe_ratio() < 0.0);
    }

    #[test]
    fn test_session_roi() {
        let mut state = GameState::new(dec!(100));
        state.update(&result(true, dec!(10), 2.0));
        assert!((state.session_roi() - 0.1).abs() < 1e-12);
    }
}
