//! Summary result writer: one JSON document per run.

use crate::core::errors::EngineError;
use crate::runner::PlanResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write a plan result to `{dir}/{name}_{timestamp}.json` and return the
/// path.
pub fn write_plan_result(
    dir: &Path,
    name: &str,
    result: &PlanResult,
) -> Result<PathBuf, EngineError> {
    fs::create_dir_all(dir).map_err(|e| EngineError::SinkIo {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    let timestamp = result.completed_at.format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{name}_{timestamp}.json"));
    let json = serde_json::to_vec_pretty(result).map_err(|e| EngineError::SinkIo {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    fs::write(&path, json).map_err(|e| EngineError::SinkIo {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    info!(path = %path.display(), "summary written");
    Ok(path)
}

/// Load a previously written plan result.
pub fn read_plan_result(path: &Path) -> Result<PlanResult, EngineError> {
    let data = fs::read(path).map_err(|e| EngineError::SinkIo {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&data).map_err(|e| EngineError::StateCorrupt {
        reason: format!("unreadable plan result {}: {e}", path.display()),
    })
}
