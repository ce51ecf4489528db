//! Core domain types: bets, decisions, stop reasons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a dice bet: UNDER wins when the roll is below the threshold,
/// OVER wins when it is above the mirrored threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    #[default]
    Under,
    Over,
}

impl BetType {
    /// The opposite side. Toggling costs nothing on the wire: it does not
    /// consume a nonce.
    pub fn toggled(self) -> Self {
        match self {
            BetType::Under => BetType::Over,
            BetType::Over => BetType::Under,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BetType::Under => "under",
            BetType::Over => "over",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-betting action a strategy may request instead of wagering.
///
/// `ToggleBetType` and `RotateSeed` do not consume a nonce; `ParkingBet`
/// does, and is tracked separately in the parking counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltAction {
    ToggleBetType,
    RotateSeed,
    ParkingBet,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Balance fell below the minimum bet
    Bankrupt,
    /// Session ROI fell to or below the stop-loss ratio
    StopLoss,
    /// Session ROI rose to or above the take-profit ratio
    TakeProfit,
    /// The configured bet budget is spent
    MaxBets,
    /// The runner's cancellation token was set
    ExternalCancel,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Bankrupt => "bankrupt",
            StopReason::StopLoss => "stop_loss",
            StopReason::TakeProfit => "take_profit",
            StopReason::MaxBets => "max_bets",
            StopReason::ExternalCancel => "external_cancel",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolved bet. Immutable once produced.
///
/// Carries the provably-fair evidence (`server_seed_hash`, `client_seed`,
/// `nonce`) so the roll can be re-derived after the epoch's server seed is
/// revealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResult {
    /// Roll in [0.00, 99.99], two decimal digits
    pub roll: f64,
    /// Win threshold the roll was compared against
    pub threshold: f64,
    pub won: bool,
    pub amount: Decimal,
    /// Payout multiplier as requested; the house edge lives in the
    /// threshold, not here
    pub multiplier: f64,
    /// `amount * multiplier` on a win, zero on a loss
    pub payout: Decimal,
    pub bet_type: BetType,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub timestamp: DateTime<Utc>,
}

impl BetResult {
    /// Net effect of this bet on the balance.
    pub fn profit(&self) -> Decimal {
        self.payout - self.amount
    }

    /// Roll expressed in integer hundredths. Exact, unlike the f64 roll;
    /// verification compares these.
    pub fn roll_hundredths(&self) -> u32 {
        (self.roll * 100.0).round() as u32
    }
}

/// What a strategy wants to do next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetDecision {
    pub amount: Decimal,
    /// Requested payout multiplier in [1.01, 99.00]
    pub multiplier: f64,
    pub bet_type: BetType,
    /// True when no ordinary bet should be placed this iteration
    pub skip: bool,
    /// Alternative action accompanying (or replacing) the bet
    pub action: Option<AltAction>,
    /// Strategy confidence in [0.1, 1.0] at decision time
    pub confidence: f64,
    /// Human-readable rationale, mostly for the detailed log
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl BetDecision {
    /// An ordinary bet.
    pub fn bet(amount: Decimal, multiplier: f64, bet_type: BetType, confidence: f64) -> Self {
        Self {
            amount,
            multiplier,
            bet_type,
            skip: false,
            action: None,
            confidence,
            reason: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Skip without any alternative action; the engine ends the session if
    /// the reason is balance-related.
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            amount: Decimal::ZERO,
            multiplier: 2.0,
            bet_type: BetType::Under,
            skip: true,
            action: None,
            confidence: 0.0,
            reason: Some(reason.into()),
            metadata: serde_json::Map::new(),
        }
    }

    /// Toggle UNDER/OVER instead of betting (no nonce consumed).
    pub fn toggle(reason: impl Into<String>) -> Self {
        Self {
            action: Some(AltAction::ToggleBetType),
            ..Self::skip(reason)
        }
    }

    /// Rotate seeds instead of betting (no nonce consumed, nonce resets).
    pub fn rotate(reason: impl Into<String>) -> Self {
        Self {
            action: Some(AltAction::RotateSeed),
            ..Self::skip(reason)
        }
    }

    /// Minimum-amount, very-high-probability bet placed to satisfy the
    /// sequential-nonce constraint.
    pub fn parking(amount: Decimal, multiplier: f64, bet_type: BetType) -> Self {
        Self {
            amount,
            multiplier,
            bet_type,
            skip: false,
            action: Some(AltAction::ParkingBet),
            confidence: 0.1,
            reason: Some("parking bet".to_string()),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}
