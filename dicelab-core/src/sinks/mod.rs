//! Persistence: JSONL event logs, summary documents, checkpoints.

pub mod checkpoint;
pub mod jsonl;
pub mod summary;

pub use checkpoint::{Checkpoint, CheckpointInfo, CheckpointManager, SessionKey};
pub use jsonl::{log_path, JsonlLogger, LogClass};
pub use summary::{read_plan_result, write_plan_result};
