//! Betting strategies for the dicelab simulation engine.
//!
//! The basic progressions (Flat, Martingale, Fibonacci, D'Alembert, Paroli)
//! implement the `Strategy` trait's small required surface and inherit the
//! framework behavior. `Composite` combines several children, `Adaptive`
//! switches between them by rule, and `Parking` wraps any of them to handle
//! the sequential-nonce constraint.

pub mod adaptive;
pub mod composite;
pub mod dalembert;
pub mod factory;
pub mod fibonacci;
pub mod flat;
pub mod martingale;
pub mod parking;
pub mod paroli;

pub mod test_helpers;

pub use adaptive::{Adaptive, AdaptiveConfig, StrategyRule, SwitchCondition};
pub use composite::{CombinationMode, Composite, CompositeConfig};
pub use dalembert::DAlembert;
pub use factory::{build_strategy, Factory};
pub use fibonacci::Fibonacci;
pub use flat::Flat;
pub use martingale::Martingale;
pub use parking::Parking;
pub use paroli::Paroli;
