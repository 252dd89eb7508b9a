use super::PipelineStep;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one executed (or rejected) step. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step: PipelineStep,
    pub success: bool,
    pub summary: String,
    pub error_detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    pub fn succeeded(step: PipelineStep, summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step,
            success: true,
            summary: summary.into(),
            error_detail: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn failed(step: PipelineStep, error_detail: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step,
            success: false,
            summary: String::new(),
            error_detail: Some(error_detail.into()),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Ordered record of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    results: Vec<StepResult>,
}

impl Default for PipelineRunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, result: StepResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn steps(&self) -> Vec<PipelineStep> {
        self.results.iter().map(|r| r.step).collect()
    }

    /// AND of every attempted step. An empty run counts as success.
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}
