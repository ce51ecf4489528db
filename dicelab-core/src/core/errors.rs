//! Domain-specific error types for the simulation core.
//!
//! These error types carry enough context to produce the structured
//! diagnostics surfaced by the binaries, and to decide the propagation
//! policy: only `ConfigInvalid` and `StateCorrupt` abort a whole run,
//! everything else is confined to the session it occurred in.

use std::fmt;

/// Errors raised by the simulation core.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Out-of-range or inconsistent configuration, detected before any
    /// session runs. Carries a suggested remediation when one exists.
    ConfigInvalid {
        /// Which field or combination failed validation
        field: String,
        /// What was wrong with it
        reason: String,
        /// Actionable fix, e.g. "base_bet is 50% of capital; consider 0.001"
        suggestion: Option<String>,
    },

    /// Bet parameters outside the allowed band. Recovered locally by
    /// clamping; surfaces only as a warning in the log.
    BetInvalid {
        /// Description of the violated constraint
        reason: String,
    },

    /// The HMAC windowing pass found no 5-hex-digit chunk <= 999_999.
    /// Vanishingly unlikely (25 independent chances per roll) but fatal for
    /// the session when it happens.
    OracleExhausted {
        /// The full HMAC hex that failed to yield a number
        hmac: String,
        /// Nonce at which extraction failed
        nonce: u64,
    },

    /// Ledger drift or other internal inconsistency. Fatal for the run;
    /// the runner checkpoints and aborts.
    StateCorrupt {
        /// Description of the inconsistency
        reason: String,
    },

    /// A log or checkpoint write failed. Non-fatal: the event is dropped
    /// after a single warning per file.
    SinkIo {
        /// Path of the sink that failed
        path: String,
        /// Underlying I/O error text
        reason: String,
    },

    /// Cooperative cancellation. Benign; the session ends with
    /// `StopReason::ExternalCancel`.
    Cancelled,
}

impl EngineError {
    /// Whether this error must abort the whole runner rather than the
    /// current session.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            EngineError::ConfigInvalid { .. } | EngineError::StateCorrupt { .. }
        )
    }

    /// Convenience constructor for config validation failures.
    pub fn config(field: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            field: field.to_string(),
            reason: reason.into(),
            suggestion: None,
        }
    }

    /// Config failure with a suggested remediation.
    pub fn config_with_hint(
        field: &str,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        EngineError::ConfigInvalid {
            field: field.to_string(),
            reason: reason.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ConfigInvalid {
                field,
                reason,
                suggestion,
            } => {
                write!(f, "invalid configuration: {field}: {reason}")?;
                if let Some(hint) = suggestion {
                    write!(f, " ({hint})")?;
                }
                Ok(())
            }
            EngineError::BetInvalid { reason } => {
                write!(f, "invalid bet: {reason}")
            }
            EngineError::OracleExhausted { hmac, nonce } => {
                write!(
                    f,
                    "oracle exhausted: no 5-hex window <= 999999 at nonce {nonce} (hmac {})",
                    &hmac[..16.min(hmac.len())]
                )
            }
            EngineError::StateCorrupt { reason } => {
                write!(f, "state corrupt: {reason}")
            }
            EngineError::SinkIo { path, reason } => {
                write!(f, "sink write failed for {path}: {reason}")
            }
            EngineError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for EngineError {}
