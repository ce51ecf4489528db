//! Session lifecycle and stop conditions.

use crate::core::types::{BetResult, StopReason};
use crate::state::{GameState, DEFAULT_HISTORY_LIMIT};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stop policy and starting bankroll for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub initial_balance: Decimal,
    /// Session ROI at or below this ends the session (e.g. -0.5)
    pub stop_loss_ratio: f64,
    /// Session ROI at or above this ends the session (e.g. 1.0)
    pub take_profit_ratio: f64,
    pub max_bets: u64,
    /// Balance below this means bankrupt
    pub min_bet: Decimal,
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10),
            stop_loss_ratio: -0.50,
            take_profit_ratio: 1.00,
            max_bets: 1000,
            min_bet: dec!(0.00015),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// One live session wrapping its [`GameState`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub config: SessionConfig,
    pub state: GameState,
    pub strategy_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<StopReason>,
    /// Set when the session died on an error rather than a stop condition
    pub error: Option<String>,
}

impl Session {
    pub fn new(id: Uuid, config: SessionConfig, strategy_name: impl Into<String>) -> Self {
        let state = GameState::with_history_limit(config.initial_balance, config.history_limit);
        Self {
            id,
            config,
            state,
            strategy_name: strategy_name.into(),
            started_at: Utc::now(),
            ended_at: None,
            stop_reason: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Fold a resolved bet into the session state.
    pub fn apply(&mut self, result: &BetResult) {
        self.state.update(result);
    }

    /// First matching stop condition, if any. Checked by the engine before
    /// every decision.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.state.balance < self.config.min_bet {
            return Some(StopReason::Bankrupt);
        }
        let roi = self.state.session_roi();
        if roi <= self.config.stop_loss_ratio {
            return Some(StopReason::StopLoss);
        }
        if roi >= self.config.take_profit_ratio {
            return Some(StopReason::TakeProfit);
        }
        if self.state.bets_count >= self.config.max_bets {
            return Some(StopReason::MaxBets);
        }
        None
    }

    pub fn end(&mut self, reason: StopReason) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
            self.stop_reason = Some(reason);
        }
    }

    /// Condense the session into its summary record.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            spec_index: 0,
            session_index: 0,
            strategy_name: self.strategy_name.clone(),
            started_at: self.started_at,
            completed_at: self.ended_at.unwrap_or_else(Utc::now),
            stop_reason: self.stop_reason.unwrap_or(StopReason::ExternalCancel),
            initial_balance: self.state.session_start_balance,
            final_balance: self.state.balance,
            profit: self.state.balance - self.state.session_start_balance,
            roi: self.state.session_roi(),
            bets: self.state.bets_count,
            wins: self.state.wins_count,
            losses: self.state.losses_count,
            win_rate: self.state.win_rate(),
            total_wagered: self.state.total_wagered,
            max_drawdown: self.state.max_drawdown,
            max_consecutive_wins: self.state.max_consecutive_wins,
            max_consecutive_losses: self.state.max_consecutive_losses,
            sharpe_ratio: self.state.sharpe_ratio(),
            parking_bets: self.state.parking_bets_count,
            parking_losses: self.state.parking_losses,
            seed_rotations: self.state.seed_rotations_count,
            bet_type_toggles: self.state.bet_type_toggles,
            error: self.error.clone(),
        }
    }
}

/// Per-session result record carried over the runner's channel, aggregated
/// into the plan result and persisted in checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    /// Index of the owning RunSpec in the plan
    pub spec_index: usize,
    /// Session ordinal within its spec
    pub session_index: u32,
    pub strategy_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub profit: Decimal,
    pub roi: f64,
    pub bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: f64,
    pub total_wagered: Decimal,
    pub max_drawdown: Decimal,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
    pub sharpe_ratio: f64,
    pub parking_bets: u64,
    pub parking_losses: Decimal,
    pub seed_rotations: u64,
    pub bet_type_toggles: u64,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BetType;

    fn result(won: bool, amount: Decimal) -> BetResult {
        BetResult {
            roll: 10.0,
            threshold: 49.5,
            won,
            amount,
            multiplier: 2.0,
            payout: if won { amount * dec!(2) } else { Decimal::ZERO },
            bet_type: BetType::Under,
            server_seed_hash: String::new(),
            client_seed: String::new(),
            nonce: 0,
            timestamp: Utc::now(),
        }
    }

    fn session(config: SessionConfig) -> Session {
        Session::new(Uuid::new_v4(), config, "test")
    }

    #[test]
    fn test_fresh_session_does_not_stop() {
        let s = session(SessionConfig::default());
        assert!(s.should_stop().is_none());
        assert!(s.is_active());
    }

    #[test]
    fn test_stop_loss_fires_at_ratio() {
        let mut s = session(SessionConfig {
            initial_balance: dec!(10),
            stop_loss_ratio: -0.5,
            ..SessionConfig::default()
        });
        s.apply(&result(false, dec!(5)));
        assert_eq!(s.should_stop(), Some(StopReason::StopLoss));
    }

    #[test]
    fn test_take_profit_fires_at_ratio() {
        let mut s = session(SessionConfig {
            initial_balance: dec!(10),
            take_profit_ratio: 0.5,
            ..SessionConfig::default()
        });
        s.apply(&result(true, dec!(5)));
        assert_eq!(s.should_stop(), Some(StopReason::TakeProfit));
    }

    #[test]
    fn test_max_bets_budget() {
        let mut s = session(SessionConfig {
            max_bets: 3,
            // Wide stops so only the budget fires
            stop_loss_ratio: -10.0,
            take_profit_ratio: 10.0,
            ..SessionConfig::default()
        });
        for _ in 0..3 {
            s.apply(&result(true, dec!(0.001)));
        }
        assert_eq!(s.should_stop(), Some(StopReason::MaxBets));
    }

    #[test]
    fn test_bankrupt_beats_other_reasons() {
        let mut s = session(SessionConfig {
            initial_balance: dec!(0.001),
            stop_loss_ratio: -0.5,
            ..SessionConfig::default()
        });
        s.apply(&result(false, dec!(0.001)));
        // Balance is zero: bankrupt is reported even though stop-loss also
        // matches
        assert_eq!(s.should_stop(), Some(StopReason::Bankrupt));
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut s = session(SessionConfig::default());
        s.end(StopReason::MaxBets);
        let first = s.ended_at;
        s.end(StopReason::Bankrupt);
        assert_eq!(s.ended_at, first);
        assert_eq!(s.stop_reason, Some(StopReason::MaxBets));
    }

    #[test]
    fn test_summary_mirrors_state() {
        let mut s = session(SessionConfig {
            initial_balance: dec!(10),
            take_profit_ratio: 10.0,
            stop_loss_ratio: -10.0,
            ..SessionConfig::default()
        });
        s.apply(&result(true, dec!(1)));
        s.apply(&result(false, dec!(1)));
        s.end(StopReason::MaxBets);
        let summary = s.summary();
        assert_eq!(summary.bets, 2);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.final_balance, dec!(10));
        assert_eq!(summary.profit, dec!(0));
        assert_eq!(summary.stop_reason, StopReason::MaxBets);
    }
}
