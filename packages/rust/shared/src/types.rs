//! Core domain types shared by the build crates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of a single executed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Name of the task that owns the step.
    pub name: String,
    /// Files written (or removed, for clean steps).
    pub outputs: Vec<PathBuf>,
    /// Wall-clock time spent in the step.
    pub elapsed: Duration,
}

/// Outcome of a complete task run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    /// The task that was requested.
    pub task: String,
    /// Steps in execution order.
    pub steps: Vec<StepReport>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Total number of files touched across all steps.
    pub fn output_count(&self) -> usize {
        self.steps.iter().map(|s| s.outputs.len()).sum()
    }
}
