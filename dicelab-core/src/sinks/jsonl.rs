//! JSON Lines event log: one file per (simulation, worker), one event per
//! line.
//!
//! Files are grouped into a mechanical hierarchy under the log root:
//! `{root}/{simulations|strategies|sessions|analysis}/{subclass}/{name}_{timestamp}.jsonl`.
//! Classification is advisory only; a misclassified file affects nothing
//! but browsing comfort. Write failures drop the event after a single
//! warning per file so an unwritable disk cannot storm the log.

use crate::core::events::{Event, EventSink};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Log family, selecting the subtree a file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    SimulationSingle,
    SimulationComparison,
    SimulationSweep,
    StrategyBasic,
    StrategyComposite,
    StrategyAdaptive,
    SessionManual,
    SessionAutomated,
    AnalysisPerformance,
    AnalysisValidation,
}

impl LogClass {
    pub fn subdir(self) -> &'static str {
        match self {
            Self::SimulationSingle => "simulations/single",
            Self::SimulationComparison => "simulations/comparison",
            Self::SimulationSweep => "simulations/parameter_sweep",
            Self::StrategyBasic => "strategies/basic",
            Self::StrategyComposite => "strategies/composite",
            Self::StrategyAdaptive => "strategies/adaptive",
            Self::SessionManual => "sessions/manual",
            Self::SessionAutomated => "sessions/automated",
            Self::AnalysisPerformance => "analysis/performance",
            Self::AnalysisValidation => "analysis/validation",
        }
    }

    /// Classify by strategy name: `Composite(...)` and `Adaptive[...]` get
    /// their own subtrees, every known basic progression shares one.
    pub fn for_strategy(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("composite") {
            Self::StrategyComposite
        } else if lower.contains("adaptive") {
            Self::StrategyAdaptive
        } else if ["martingale", "fibonacci", "dalembert", "flat", "paroli", "parking"]
            .iter()
            .any(|basic| lower.contains(basic))
        {
            Self::StrategyBasic
        } else {
            Self::SessionManual
        }
    }
}

/// Resolve the full path for a log file name under the classified subtree.
pub fn log_path(root: &Path, class: LogClass, filename: &str) -> PathBuf {
    root.join(class.subdir()).join(filename)
}

/// Buffered JSONL writer implementing [`EventSink`].
pub struct JsonlLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    /// One warning per file, then silence
    warned: bool,
}

impl JsonlLogger {
    /// Open (creating parent directories) a log file under the classified
    /// hierarchy.
    pub fn create(root: &Path, class: LogClass, filename: &str) -> std::io::Result<Self> {
        let path = log_path(root, class, filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            warned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, event: &Event) -> std::io::Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Ok(()),
        };
        serde_json::to_writer(&mut *writer, event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writer.write_all(b"\n")
    }
}

impl EventSink for JsonlLogger {
    fn on_event(&mut self, event: &Event) {
        if let Err(err) = self.write_line(event) {
            if !self.warned {
                self.warned = true;
                warn!(path = %self.path.display(), %err, "dropping events after sink write failure");
            }
        }
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writer.flush() {
                if !self.warned {
                    self.warned = true;
                    warn!(path = %self.path.display(), %err, "failed to flush event log");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventKind;
    use serde_json::json;

    #[test]
    fn test_strategy_classification() {
        assert_eq!(
            LogClass::for_strategy("Composite(WEIGHTED)[Flat,Martingale]"),
            LogClass::StrategyComposite
        );
        assert_eq!(
            LogClass::for_strategy("Adaptive[martingale]"),
            LogClass::StrategyAdaptive
        );
        assert_eq!(LogClass::for_strategy("Martingale"), LogClass::StrategyBasic);
        assert_eq!(
            LogClass::for_strategy("Parking(Fibonacci)"),
            LogClass::StrategyBasic
        );
        assert_eq!(LogClass::for_strategy("Mystery"), LogClass::SessionManual);
    }

    #[test]
    fn test_log_path_layout() {
        let path = log_path(
            Path::new("betlog"),
            LogClass::SimulationSweep,
            "sweep_w3_20250101.jsonl",
        );
        assert_eq!(
            path,
            PathBuf::from("betlog/simulations/parameter_sweep/sweep_w3_20250101.jsonl")
        );
    }

    #[test]
    fn test_writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger =
            JsonlLogger::create(dir.path(), LogClass::StrategyBasic, "flat_test.jsonl").unwrap();

        for i in 0..3 {
            logger.on_event(&Event::new(
                EventKind::BetResult,
                None,
                json!({ "i": i }),
            ));
        }
        logger.flush();

        let content = fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["kind"], "BET_RESULT");
            assert_eq!(value["payload"]["i"], i);
        }
    }
}
