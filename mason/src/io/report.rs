//! Completion report written at the end of a run.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{Facing, FuelLevel, RunMode, Vec3};
use crate::io::write_atomic;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step was placed, reused or skipped.
    Completed,
    /// The run reached the end with failed steps, or was cancelled by the operator.
    Incomplete,
    /// Operator abort or exhausted recovery.
    Aborted,
    /// Fatal configuration or capability error.
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Incomplete => "incomplete",
            RunOutcome::Aborted => "aborted",
            RunOutcome::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub outcome: RunOutcome,
    /// Total planned steps.
    pub steps: usize,
    pub placed: u32,
    pub reused: u32,
    /// Cells emptied in excavation mode.
    pub cleared: u32,
    /// Air cells inside the bounds that produced no step.
    pub skipped: u32,
    pub failed: u32,
    pub manual_pauses: u32,
    pub final_position: Vec3,
    pub final_facing: Facing,
    pub final_fuel: FuelLevel,
    /// Last diagnostic, when the run did not complete.
    pub last_error: Option<String>,
}

impl RunReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{}: placed={} reused={} cleared={} skipped={} failed={} manual_pauses={} fuel={} at {} facing {}",
            self.outcome,
            self.placed,
            self.reused,
            self.cleared,
            self.skipped,
            self.failed,
            self.manual_pauses,
            self.final_fuel,
            self.final_position,
            self.final_facing,
        )
    }
}

/// Atomically write the report as pretty JSON (temp file + rename).
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    debug!(path = %path.display(), outcome = %report.outcome, "writing run report");
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    write_atomic(path, &buf, "report")
}

pub fn load_report(path: &Path) -> Result<RunReport> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read report {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            mode: RunMode::Build,
            outcome: RunOutcome::Incomplete,
            steps: 12,
            placed: 9,
            reused: 1,
            cleared: 0,
            skipped: 2,
            failed: 2,
            manual_pauses: 1,
            final_position: Vec3::ZERO,
            final_facing: Facing::North,
            final_fuel: FuelLevel::Level(340),
            last_error: Some("blocked at (1, 0, 2)".to_string()),
        }
    }

    #[test]
    fn report_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out").join("report.json");
        write_report(&path, &report()).expect("write");
        assert_eq!(load_report(&path).expect("load"), report());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&RunOutcome::Completed).expect("json");
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn summary_names_counts() {
        let line = report().summary();
        assert!(line.starts_with("incomplete: placed=9 reused=1"));
        assert!(line.contains("fuel=340"));
    }
}
