//! Resumable checkpoints.
//!
//! After every `checkpoint_interval` completed sessions the aggregator
//! writes a snapshot of the plan, the completed session keys and the
//! partial summaries. Writes are atomic (write to a temp name, then
//! rename); the aggregator is the only writer. On resume the runner skips
//! completed sessions and re-executes the rest - whole-session granularity
//! only. Checkpoints past their age limit are pruned.

use crate::core::errors::EngineError;
use crate::money::session::SessionSummary;
use crate::runner::Plan;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Identifies one session slot in a plan: `(spec index, session ordinal)`.
pub type SessionKey = (usize, u32);

/// Snapshot sufficient to resume a partially-run plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub simulation_id: String,
    pub written_at: DateTime<Utc>,
    pub plan: Plan,
    pub completed: Vec<SessionKey>,
    pub partial_summaries: Vec<SessionSummary>,
}

/// Lightweight listing entry (no summaries loaded).
#[derive(Debug, Clone)]
pub struct CheckpointInfo {
    pub simulation_id: String,
    pub written_at: DateTime<Utc>,
    pub completed_sessions: usize,
    pub total_sessions: u32,
    pub path: PathBuf,
}

impl CheckpointInfo {
    pub fn remaining_sessions(&self) -> u32 {
        self.total_sessions
            .saturating_sub(self.completed_sessions as u32)
    }
}

/// Owns the checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, simulation_id: &str) -> PathBuf {
        self.dir.join(format!("{simulation_id}.checkpoint.json"))
    }

    /// Atomically persist a checkpoint: serialize to `<name>.tmp`, then
    /// rename over the final path.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<PathBuf, EngineError> {
        let final_path = self.path_for(&checkpoint.simulation_id);
        let tmp_path = final_path.with_extension("json.tmp");

        let io_err = |e: std::io::Error| EngineError::SinkIo {
            path: final_path.display().to_string(),
            reason: e.to_string(),
        };

        let json = serde_json::to_vec_pretty(checkpoint).map_err(|e| EngineError::SinkIo {
            path: final_path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&tmp_path, json).map_err(io_err)?;
        fs::rename(&tmp_path, &final_path).map_err(io_err)?;

        debug!(
            simulation_id = %checkpoint.simulation_id,
            completed = checkpoint.completed.len(),
            "checkpoint written"
        );
        Ok(final_path)
    }

    pub fn load(&self, simulation_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let path = self.path_for(simulation_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|e| EngineError::SinkIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let checkpoint = serde_json::from_slice(&data).map_err(|e| EngineError::StateCorrupt {
            reason: format!("unreadable checkpoint {}: {e}", path.display()),
        })?;
        Ok(Some(checkpoint))
    }

    /// All checkpoints on disk, newest first. Unreadable files are skipped
    /// with a warning.
    pub fn list(&self) -> Vec<CheckpointInfo> {
        let mut infos = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return infos,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".checkpoint.json"))
            {
                continue;
            }
            match fs::read(&path)
                .ok()
                .and_then(|data| serde_json::from_slice::<Checkpoint>(&data).ok())
            {
                Some(checkpoint) => infos.push(CheckpointInfo {
                    simulation_id: checkpoint.simulation_id,
                    written_at: checkpoint.written_at,
                    completed_sessions: checkpoint.completed.len(),
                    total_sessions: checkpoint.plan.total_sessions(),
                    path,
                }),
                None => warn!(path = %path.display(), "skipping unreadable checkpoint"),
            }
        }
        infos.sort_by(|a, b| b.written_at.cmp(&a.written_at));
        infos
    }

    pub fn delete(&self, simulation_id: &str) -> bool {
        fs::remove_file(self.path_for(simulation_id)).is_ok()
    }

    /// Remove checkpoints older than `max_age_days`. Returns how many were
    /// deleted.
    pub fn prune(&self, max_age_days: u32, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(i64::from(max_age_days));
        let mut pruned = 0;
        for info in self.list() {
            if info.written_at < cutoff && fs::remove_file(&info.path).is_ok() {
                pruned += 1;
            }
        }
        if pruned > 0 {
            info!(pruned, max_age_days, "pruned old checkpoints");
        }
        pruned
    }

    /// Human-oriented hints for the `recovery` command.
    pub fn recovery_suggestions(&self, now: DateTime<Utc>) -> Vec<String> {
        let checkpoints = self.list();
        if checkpoints.is_empty() {
            return vec!["No checkpoints available for recovery".to_string()];
        }
        let mut suggestions = Vec::new();
        let recent_incomplete: Vec<&CheckpointInfo> = checkpoints
            .iter()
            .filter(|cp| {
                cp.remaining_sessions() > 0 && (now - cp.written_at) < Duration::hours(24)
            })
            .collect();
        if recent_incomplete.is_empty() {
            suggestions.push("No recent incomplete simulations".to_string());
        } else {
            suggestions.push("Recent incomplete simulations:".to_string());
            for cp in recent_incomplete.iter().take(3) {
                suggestions.push(format!(
                    "  {}: {} of {} sessions remaining",
                    cp.simulation_id,
                    cp.remaining_sessions(),
                    cp.total_sessions,
                ));
            }
        }
        suggestions
    }
}
