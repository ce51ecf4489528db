//! Vault / working-bankroll split.
//!
//! Invariant: `vault + working == total deposited + cumulative P&L -
//! withdrawals` at every quiescent point, to the last fractional digit.
//! Auto transfers (replenish, skim) are rate limited to
//! `max_transfers_per_day` in any rolling 24-hour window; over the limit
//! they become no-ops until the window slides. Manual transfers bypass the
//! limit.

use crate::core::errors::EngineError;
use crate::money::{mul_rate, ratio_split};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Vault sizing and transfer policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub total_capital: Decimal,
    pub vault_ratio: f64,
    pub working_ratio: f64,
    pub max_transfers_per_day: u32,
}

impl VaultConfig {
    pub fn new(total_capital: Decimal) -> Self {
        Self {
            total_capital,
            vault_ratio: 0.85,
            working_ratio: 0.15,
            max_transfers_per_day: 2,
        }
    }
}

/// What initiated a transfer; only auto transfers count against the rate
/// limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferTrigger {
    Auto,
    Manual,
}

/// The bankroll ledger. Created once per simulation.
#[derive(Debug, Clone)]
pub struct Vault {
    config: VaultConfig,
    vault_balance: Decimal,
    working_balance: Decimal,
    /// Working size at creation; replenish targets this level
    starting_working: Decimal,
    total_deposited: Decimal,
    total_withdrawn: Decimal,
    /// Timestamps of recent auto transfers (rolling window)
    auto_transfers: VecDeque<DateTime<Utc>>,
}

impl Vault {
    pub fn new(config: VaultConfig) -> Result<Self, EngineError> {
        if config.total_capital <= Decimal::ZERO {
            return Err(EngineError::config(
                "vault.total_capital",
                "capital must be positive",
            ));
        }
        let ratio_sum = config.vault_ratio + config.working_ratio;
        if (ratio_sum - 1.0).abs() > 1e-9 {
            return Err(EngineError::config_with_hint(
                "vault.vault_ratio",
                format!("vault_ratio + working_ratio = {ratio_sum}, expected 1.0"),
                "use vault_ratio = 0.85, working_ratio = 0.15",
            ));
        }
        let (vault_balance, working_balance) =
            ratio_split(config.total_capital, config.vault_ratio);
        Ok(Self {
            vault_balance,
            working_balance,
            starting_working: working_balance,
            total_deposited: config.total_capital,
            total_withdrawn: Decimal::ZERO,
            auto_transfers: VecDeque::new(),
            config,
        })
    }

    pub fn vault_balance(&self) -> Decimal {
        self.vault_balance
    }

    pub fn working_balance(&self) -> Decimal {
        self.working_balance
    }

    pub fn total_balance(&self) -> Decimal {
        self.vault_balance + self.working_balance
    }

    /// Net capital the ledger should currently hold.
    pub fn expected_total(&self) -> Decimal {
        self.total_deposited - self.total_withdrawn
    }

    /// Working bankroll a new session receives. The amount is deducted from
    /// working; the session returns its final balance via
    /// [`Vault::close_session`].
    pub fn create_session(&mut self, initial: Decimal) -> Result<Decimal, EngineError> {
        if initial <= Decimal::ZERO {
            return Err(EngineError::config(
                "session.initial_balance",
                "session bankroll must be positive",
            ));
        }
        if initial > self.working_balance {
            return Err(EngineError::config_with_hint(
                "session.initial_balance",
                format!(
                    "session bankroll {initial} exceeds working balance {}",
                    self.working_balance
                ),
                "lower initial_balance or deposit more capital",
            ));
        }
        self.working_balance -= initial;
        Ok(initial)
    }

    /// Whether the working bankroll can fund another session.
    pub fn can_fund(&self, initial: Decimal) -> bool {
        initial > Decimal::ZERO && initial <= self.working_balance
    }

    /// Return a finished session's final balance to the working bankroll,
    /// then apply the auto skim/replenish policy.
    pub fn close_session(
        &mut self,
        initial: Decimal,
        final_balance: Decimal,
        now: DateTime<Utc>,
    ) {
        self.working_balance += final_balance;
        let profit = final_balance - initial;

        // Skim when the session made at least +10% of the starting working
        // size; the vault takes its ratio of the profit.
        let skim_threshold = mul_rate(self.starting_working, 0.10);
        if profit >= skim_threshold && profit > Decimal::ZERO {
            let skim_amount = mul_rate(profit, self.config.vault_ratio);
            self.skim(skim_amount, TransferTrigger::Auto, now);
        }

        // Replenish when working dropped below half of its starting size.
        let replenish_floor = mul_rate(self.starting_working, 0.50);
        if self.working_balance < replenish_floor {
            self.replenish(TransferTrigger::Auto, now);
        }
    }

    /// Move funds from vault to bring working back to its starting size.
    /// Auto calls over the rate limit are no-ops.
    pub fn replenish(&mut self, trigger: TransferTrigger, now: DateTime<Utc>) -> Decimal {
        if trigger == TransferTrigger::Auto && !self.take_transfer_slot(now) {
            debug!("vault replenish skipped: transfer rate limit reached");
            return Decimal::ZERO;
        }
        let deficit = (self.starting_working - self.working_balance).max(Decimal::ZERO);
        let amount = deficit.min(self.vault_balance);
        if amount > Decimal::ZERO {
            self.vault_balance -= amount;
            self.working_balance += amount;
            debug!(%amount, "vault replenished working bankroll");
        }
        amount
    }

    /// Move realized profit from working into the vault. Auto calls over
    /// the rate limit are no-ops.
    pub fn skim(&mut self, amount: Decimal, trigger: TransferTrigger, now: DateTime<Utc>) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        if trigger == TransferTrigger::Auto && !self.take_transfer_slot(now) {
            debug!("vault skim skipped: transfer rate limit reached");
            return Decimal::ZERO;
        }
        let amount = amount.min(self.working_balance);
        self.working_balance -= amount;
        self.vault_balance += amount;
        debug!(%amount, "skimmed profit into vault");
        amount
    }

    /// Add fresh capital, split by the configured ratios.
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::config(
                "vault.deposit",
                "deposit must be positive",
            ));
        }
        let (to_vault, to_working) = ratio_split(amount, self.config.vault_ratio);
        self.vault_balance += to_vault;
        self.working_balance += to_working;
        self.total_deposited += amount;
        Ok(())
    }

    /// Withdraw from the vault side only.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<Decimal, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::config(
                "vault.withdraw",
                "withdrawal must be positive",
            ));
        }
        if amount > self.vault_balance {
            return Err(EngineError::config(
                "vault.withdraw",
                format!("insufficient vault balance: {}", self.vault_balance),
            ));
        }
        self.vault_balance -= amount;
        self.total_withdrawn += amount;
        Ok(amount)
    }

    /// Restore the configured vault/working ratio over the current total.
    pub fn rebalance(&mut self) {
        let total = self.total_balance();
        if total <= Decimal::ZERO {
            return;
        }
        let (vault, working) = ratio_split(total, self.config.vault_ratio);
        self.vault_balance = vault;
        self.working_balance = working;
    }

    /// Verify the closure invariant against an externally tracked P&L sum.
    pub fn check_closure(&self, cumulative_pnl: Decimal) -> Result<(), EngineError> {
        let expected = self.expected_total() + cumulative_pnl;
        let actual = self.total_balance();
        if actual != expected {
            return Err(EngineError::StateCorrupt {
                reason: format!("ledger drift: vault+working = {actual}, expected {expected}"),
            });
        }
        Ok(())
    }

    /// Claim an auto-transfer slot in the rolling 24-hour window.
    fn take_transfer_slot(&mut self, now: DateTime<Utc>) -> bool {
        let window_start = now - Duration::hours(24);
        while matches!(self.auto_transfers.front(), Some(&t) if t < window_start) {
            self.auto_transfers.pop_front();
        }
        if self.auto_transfers.len() >= self.config.max_transfers_per_day as usize {
            return false;
        }
        self.auto_transfers.push_back(now);
        true
    }
}
