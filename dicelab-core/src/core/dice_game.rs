//! Game entity: oracle plus house-edge threshold computation.
//!
//! Threshold math stays in f64 on purpose: the roll itself is an f64 and the
//! `won` boolean is the only thing that crosses into the Decimal ledger.
//! Payouts use the requested multiplier unmodified; the 1% edge is expressed
//! exclusively through the shrunken winning threshold (Bitsler convention).

use crate::core::errors::EngineError;
use crate::core::provably_fair::{ProvablyFair, SeedInfo, SeedPair, Verification, verify_roll};
use crate::core::types::{BetResult, BetType};
use crate::money::{dec_from_f64, mul_rate};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Game-level limits and the house edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_house_edge")]
    pub house_edge: f64,
    #[serde(default = "default_min_bet")]
    pub min_bet: Decimal,
    #[serde(default = "default_max_bet")]
    pub max_bet: Decimal,
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,
}

fn default_house_edge() -> f64 {
    0.01
}
fn default_min_bet() -> Decimal {
    dec!(0.00015)
}
fn default_max_bet() -> Decimal {
    dec!(1000)
}
fn default_min_multiplier() -> f64 {
    1.01
}
fn default_max_multiplier() -> f64 {
    99.0
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            house_edge: default_house_edge(),
            min_bet: default_min_bet(),
            max_bet: default_max_bet(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
        }
    }
}

/// Winning probability (in percent) for a multiplier under the house edge.
pub fn win_chance(multiplier: f64, house_edge: f64) -> f64 {
    (100.0 / multiplier) * (1.0 - house_edge)
}

/// Threshold a roll is compared against. For UNDER the bet wins when
/// `roll < threshold`; for OVER when `roll > 100 - threshold`.
pub fn win_threshold(multiplier: f64, house_edge: f64) -> f64 {
    win_chance(multiplier, house_edge)
}

/// Multiplier whose UNDER threshold equals `target` (used by the parking
/// wrapper, which thinks in targets like the Bitsler UI does).
pub fn multiplier_for_target(target: f64, house_edge: f64) -> f64 {
    let chance = target * (1.0 - house_edge);
    if chance <= 0.0 {
        return 99.0;
    }
    (100.0 / chance).clamp(1.01, 99.0)
}

/// One dice game: an oracle and the edge applied to it.
pub struct DiceGame {
    config: GameConfig,
    oracle: ProvablyFair,
}

impl DiceGame {
    pub fn new(config: GameConfig, oracle: ProvablyFair) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Next nonce the oracle would consume.
    pub fn nonce(&self) -> u64 {
        self.oracle.nonce()
    }

    /// Resolve one bet. Consumes exactly one nonce.
    pub fn roll(
        &mut self,
        amount: Decimal,
        multiplier: f64,
        bet_type: BetType,
    ) -> Result<BetResult, EngineError> {
        if amount < self.config.min_bet {
            return Err(EngineError::BetInvalid {
                reason: format!("bet {amount} below minimum {}", self.config.min_bet),
            });
        }
        if amount > self.config.max_bet {
            return Err(EngineError::BetInvalid {
                reason: format!("bet {amount} above maximum {}", self.config.max_bet),
            });
        }
        if multiplier < self.config.min_multiplier || multiplier > self.config.max_multiplier {
            return Err(EngineError::BetInvalid {
                reason: format!(
                    "multiplier {multiplier} outside [{}, {}]",
                    self.config.min_multiplier, self.config.max_multiplier
                ),
            });
        }

        let threshold = win_threshold(multiplier, self.config.house_edge);
        let info = self.oracle.current_info();
        let roll = self.oracle.next_roll()?;

        let won = match bet_type {
            BetType::Under => roll < threshold,
            BetType::Over => roll > 100.0 - threshold,
        };
        let payout = if won {
            mul_rate(amount, multiplier)
        } else {
            Decimal::ZERO
        };

        Ok(BetResult {
            roll,
            threshold,
            won,
            amount,
            multiplier,
            payout,
            bet_type,
            server_seed_hash: info.server_seed_hash,
            client_seed: info.client_seed,
            nonce: info.nonce,
            timestamp: Utc::now(),
        })
    }

    /// Rotate seeds; the returned epoch's server seed is now revealed.
    pub fn rotate_seeds(&mut self) -> SeedPair {
        self.oracle.rotate_seeds()
    }

    pub fn set_client_seed(&mut self, client_seed: &str) -> Result<(), EngineError> {
        self.oracle.set_client_seed(client_seed)
    }

    pub fn current_seed_info(&self) -> SeedInfo {
        self.oracle.current_info()
    }

    pub fn verifiable_history(&self) -> &[SeedPair] {
        self.oracle.verifiable_history()
    }

    /// Verify a past result against the revealed seed history. Returns
    /// `None` when the epoch has not been revealed yet (rotation pending).
    pub fn verify(&self, result: &BetResult) -> Result<Option<Verification>, EngineError> {
        match self.oracle.revealed_seed_for(&result.server_seed_hash) {
            Some(pair) => verify_roll(
                &pair.server_seed,
                &result.client_seed,
                result.nonce,
                result.roll,
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// Expected value of a bet: `amount * M * p - amount`. Reported only,
    /// never used to gate execution.
    pub fn expected_value(&self, amount: Decimal, multiplier: f64) -> Decimal {
        let p = win_chance(multiplier, self.config.house_edge) / 100.0;
        mul_rate(mul_rate(amount, multiplier), p) - amount
    }

    /// Fractional-Kelly stake suggestion (quarter Kelly, capped at 10% of
    /// bankroll). Negative edges yield zero.
    pub fn kelly_stake(&self, bankroll: Decimal, multiplier: f64) -> Decimal {
        let p = win_chance(multiplier, self.config.house_edge) / 100.0;
        let q = 1.0 - p;
        let b = multiplier - 1.0;
        if b <= 0.0 {
            return Decimal::ZERO;
        }
        let kelly = (b * p - q) / b;
        if kelly <= 0.0 {
            return Decimal::ZERO;
        }
        let safe = (kelly * 0.25).min(0.1);
        match dec_from_f64(safe) {
            Some(fraction) => crate::money::round_money(bankroll * fraction),
            None => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provably_fair::ProvablyFair;

    const SERVER: &str = "e6bbf5eda32e178e78a2c8e73b4b8bea1c17e01ac5b8e5c0d42d2a29f4b76eb7";

    fn fixed_game() -> DiceGame {
        let oracle = ProvablyFair::new(Some(SERVER.into()), Some("test_client".into()));
        DiceGame::new(GameConfig::default(), oracle)
    }

    #[test]
    fn test_threshold_carries_the_edge() {
        // 2x multiplier: 49.5% win chance, not 50%
        assert!((win_threshold(2.0, 0.01) - 49.5).abs() < 1e-12);
        // 99x: just above 1%
        assert!((win_threshold(99.0, 0.01) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_for_target_parking_band() {
        // target 98 -> ~1.0304x; wins unless the roll lands in the top 2%
        let m = multiplier_for_target(98.0, 0.01);
        assert!((m - 100.0 / (98.0 * 0.99)).abs() < 1e-12);
        assert!(m > 1.01 && m < 1.04);
    }

    #[test]
    fn test_roll_consumes_one_nonce_and_records_evidence() {
        let mut game = fixed_game();
        let result = game.roll(dec!(0.001), 2.0, BetType::Under).unwrap();
        assert_eq!(result.nonce, 0);
        assert_eq!(game.nonce(), 1);
        // Known vector: nonce 0 rolls 97.84, above the 49.5 threshold
        assert_eq!(result.roll_hundredths(), 9784);
        assert!(!result.won);
        assert_eq!(result.payout, Decimal::ZERO);
        assert_eq!(result.profit(), dec!(-0.001));
    }

    #[test]
    fn test_over_bet_wins_high_roll() {
        let mut game = fixed_game();
        // Roll 97.84 > 100 - 49.5
        let result = game.roll(dec!(0.001), 2.0, BetType::Over).unwrap();
        assert!(result.won);
        assert_eq!(result.payout, dec!(0.002));
        assert_eq!(result.profit(), dec!(0.001));
    }

    #[test]
    fn test_bet_validation() {
        let mut game = fixed_game();
        assert!(game.roll(dec!(0.0001), 2.0, BetType::Under).is_err());
        assert!(game.roll(dec!(2000), 2.0, BetType::Under).is_err());
        assert!(game.roll(dec!(0.001), 1.0, BetType::Under).is_err());
        assert!(game.roll(dec!(0.001), 100.0, BetType::Under).is_err());
        // Nothing above consumed a nonce
        assert_eq!(game.nonce(), 0);
    }

    #[test]
    fn test_verify_after_rotation() {
        let mut game = fixed_game();
        let result = game.roll(dec!(0.001), 2.0, BetType::Under).unwrap();
        // Epoch not revealed yet
        assert!(game.verify(&result).unwrap().is_none());
        game.rotate_seeds();
        let verification = game.verify(&result).unwrap().unwrap();
        assert!(verification.valid);
    }

    #[test]
    fn test_expected_value_is_negative_at_the_edge() {
        let game = fixed_game();
        let ev = game.expected_value(dec!(1), 2.0);
        // EV = 1*2*0.495 - 1 = -0.01
        assert_eq!(ev, dec!(-0.01));
    }

    #[test]
    fn test_kelly_zero_for_house_games() {
        let game = fixed_game();
        // Every dice bet has negative expectation; Kelly says do not bet
        assert_eq!(game.kelly_stake(dec!(100), 2.0), Decimal::ZERO);
        assert_eq!(game.kelly_stake(dec!(100), 1.5), Decimal::ZERO);
    }
}
