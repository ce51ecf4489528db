//! Core domain: types, errors, the provably-fair oracle, the game entity
//! and the event bus.

pub mod dice_game;
pub mod errors;
pub mod events;
pub mod provably_fair;
pub mod types;

pub use dice_game::{DiceGame, GameConfig, multiplier_for_target, win_chance, win_threshold};
pub use errors::EngineError;
pub use events::{Event, EventBus, EventKind, EventSink, EVENT_HISTORY_LIMIT};
pub use provably_fair::{
    batch_verify, hmac_hex, roll_value, verify_roll, ProvablyFair, SeedInfo, SeedPair,
    Verification,
};
pub use types::{AltAction, BetDecision, BetResult, BetType, StopReason};
