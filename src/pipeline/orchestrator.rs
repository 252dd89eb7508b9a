//! Pipeline Orchestrator
//!
//! Runs requested steps strictly one after another in canonical order,
//! validating each step's configuration before its handler is invoked.

use super::result::{PipelineRunSummary, StepResult};
use super::PipelineStep;
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

/// Handler for individual steps.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run `step`. An `Err` is an unexpected condition and is recorded as a
    /// failed step; expected failures come back as an unsuccessful [`StepResult`].
    async fn execute(&self, step: PipelineStep, config: &Config) -> Result<StepResult>;
}

pub struct Orchestrator<E: StepExecutor> {
    config: Config,
    executor: E,
    stop_on_error: bool,
}

impl<E: StepExecutor> Orchestrator<E> {
    /// `stop_on_error` comes from `pipeline.stop_on_error` (default true).
    pub fn new(config: Config, executor: E) -> Self {
        let stop_on_error = config.get_bool("pipeline.stop_on_error").unwrap_or(true);
        Self {
            config,
            executor,
            stop_on_error,
        }
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Requested steps in canonical order, duplicates removed.
    pub fn plan(requested: &[PipelineStep]) -> Vec<PipelineStep> {
        PipelineStep::ALL
            .into_iter()
            .filter(|step| requested.contains(step))
            .collect()
    }

    /// Run and return overall success.
    pub async fn run(&self, requested: &[PipelineStep]) -> bool {
        self.run_with_summary(requested).await.success()
    }

    pub async fn run_with_summary(&self, requested: &[PipelineStep]) -> PipelineRunSummary {
        let mut summary = PipelineRunSummary::new();
        let plan = Self::plan(requested);
        info!(
            run_id = %summary.run_id,
            "Starting pipeline with steps: {}",
            plan.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );

        for step in plan {
            let result = self.run_step(step).await;
            let failed = !result.success;
            summary.record(result);

            if failed && self.stop_on_error {
                error!("Step {} failed, stopping pipeline", step);
                break;
            }
        }

        self.log_summary(&summary);
        summary
    }

    async fn run_step(&self, step: PipelineStep) -> StepResult {
        info!("=== Running step: {} ===", step);
        let started = Utc::now();

        let (valid, errors) = self.config.validate(step);
        if !valid {
            error!("Configuration validation failed for {} step", step);
            return StepResult::failed(step, errors.join("; ")).with_timing(started, Utc::now());
        }

        let result = match self.executor.execute(step, &self.config).await {
            Ok(result) => result,
            Err(e) => {
                error!("Step {} raised an unexpected error: {}", step, e);
                StepResult::failed(step, e.to_string())
            }
        };
        let result = result.with_timing(started, Utc::now());

        if result.success {
            info!("Step {} completed in {:.1}s", step, result.duration_seconds());
        } else {
            warn!(
                "Step {} failed: {}",
                step,
                result.error_detail.as_deref().unwrap_or("no detail")
            );
        }
        result
    }

    fn log_summary(&self, summary: &PipelineRunSummary) {
        info!("=== Pipeline Summary ({}) ===", summary.run_id);
        for result in summary.results() {
            let status = if result.success { "SUCCESS" } else { "FAILURE" };
            info!("{:<10} {}", result.step.as_str(), status);
        }
        if summary.success() {
            info!("Pipeline completed successfully");
        } else {
            error!("Pipeline completed with failures");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_is_canonical_and_deduplicated() {
        struct Noop;
        #[async_trait]
        impl StepExecutor for Noop {
            async fn execute(&self, step: PipelineStep, _: &Config) -> Result<StepResult> {
                Ok(StepResult::succeeded(step, ""))
            }
        }

        let plan = Orchestrator::<Noop>::plan(&[
            PipelineStep::Report,
            PipelineStep::Data,
            PipelineStep::Report,
        ]);
        assert_eq!(plan, vec![PipelineStep::Data, PipelineStep::Report]);
    }
}
