//! Fixed-point money arithmetic.
//!
//! Every balance, bet and payout in the system is a [`rust_decimal::Decimal`].
//! The only place a binary float is allowed to touch a wagered value is the
//! conversion helpers in this module, which route through the decimal string
//! form and round half-to-even at [`MONEY_SCALE`] fractional digits. Floats
//! are forbidden in any other path that influences ledger balances.

pub mod session;
pub mod vault;

pub use session::{Session, SessionConfig};
pub use vault::{TransferTrigger, Vault, VaultConfig};

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Fractional digits carried by every ledger value.
pub const MONEY_SCALE: u32 = 12;

/// Round a value to ledger precision, half-to-even.
///
/// This is the single rounding mode used everywhere; callers must not pick
/// their own strategy.
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Convert an f64 rate (game multiplier, vault ratio) into a `Decimal`
/// through its shortest decimal string form.
///
/// Returns `None` for NaN/infinite inputs or values outside `Decimal`
/// range. The string round-trip matches what a user wrote in a config
/// file, where `Decimal::from_f64` would import the float's binary
/// representation error.
pub fn dec_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&format!("{value}")).ok()
}

/// Multiply a money amount by an f64 rate, rounded to ledger precision.
/// Non-finite rates yield zero; rates are validated at config load.
pub fn mul_rate(amount: Decimal, rate: f64) -> Decimal {
    match dec_from_f64(rate) {
        Some(r) => round_money(amount * r),
        None => Decimal::ZERO,
    }
}

/// Split a total into `(portion, remainder)` where `portion ≈ total * ratio`
/// and `portion + remainder == total` exactly.
pub fn ratio_split(total: Decimal, ratio: f64) -> (Decimal, Decimal) {
    let portion = mul_rate(total, ratio);
    (portion, total - portion)
}
