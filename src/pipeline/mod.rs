//! Pipeline step model and orchestration.

pub mod orchestrator;
pub mod result;

pub use orchestrator::{Orchestrator, StepExecutor};
pub use result::{PipelineRunSummary, StepResult};

use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stages in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Data,
    Convert,
    Upload,
    Ddl,
    Cross,
    Benchmark,
    Report,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 7] = [
        PipelineStep::Data,
        PipelineStep::Convert,
        PipelineStep::Upload,
        PipelineStep::Ddl,
        PipelineStep::Cross,
        PipelineStep::Benchmark,
        PipelineStep::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Data => "data",
            PipelineStep::Convert => "convert",
            PipelineStep::Upload => "upload",
            PipelineStep::Ddl => "ddl",
            PipelineStep::Cross => "cross",
            PipelineStep::Benchmark => "benchmark",
            PipelineStep::Report => "report",
        }
    }

    /// Parse CLI step names. `all` anywhere in the list selects every step.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<PipelineStep>, BenchError> {
        if names.is_empty() || names.iter().any(|n| n.as_ref().eq_ignore_ascii_case("all")) {
            return Ok(Self::ALL.to_vec());
        }
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStep {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == name)
            .ok_or_else(|| {
                BenchError::Configuration(format!(
                    "Unknown step '{}' (expected one of: {}, all)",
                    s,
                    Self::ALL.map(|step| step.as_str()).join(", ")
                ))
            })
    }
}
