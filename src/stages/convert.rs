//! `convert` step: turn raw pipe-delimited `.dat` tables into each target format.
//!
//! Every (scale, table, format) conversion is attempted. A missing input table
//! is skipped with a warning; a failed conversion is logged and the step moves
//! on. The step succeeds when at least one conversion ran and none failed.

use super::StageContext;
use crate::command::CommandSpec;
use crate::config::DataGenSettings;
use crate::error::{BenchError, Result};
use crate::pipeline::{PipelineStep, StepResult};
use std::path::Path;
use tracing::{info, warn};

/// `<converter> --input <dat> --output <dir> --format <fmt> --delimiter |`
pub fn converter_command(converter: &str, input: &Path, output: &Path, format: &str) -> CommandSpec {
    CommandSpec::process(
        converter,
        [
            "--input".to_string(),
            input.to_string_lossy().into_owned(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
            "--format".to_string(),
            format.to_string(),
            "--delimiter".to_string(),
            "|".to_string(),
        ],
    )
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionTally {
    pub converted: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let settings = DataGenSettings::from_config(ctx.config);
    let converter = settings.converter_path.clone().ok_or_else(|| {
        BenchError::Configuration("data_generation.converter_path is not set".to_string())
    })?;

    let mut tally = ConversionTally::default();
    for &scale in &ctx.pipeline.scale_factors {
        for table in &settings.tables {
            let input = ctx.dirs.data.join(format!("{}gb", scale)).join(format!("{}.dat", table));
            if !input.exists() {
                warn!("Input file not found, skipping: {}", input.display());
                tally.skipped += 1;
                continue;
            }

            for format in &ctx.pipeline.formats {
                let output = ctx
                    .dirs
                    .formatted_data
                    .join(format!("{}gb", scale))
                    .join(format)
                    .join(table);
                let outcome = ctx
                    .runner
                    .run(
                        &converter_command(&converter, &input, &output, format),
                        &format!("Converting {} ({}GB) to {}", table, scale, format),
                    )
                    .await;
                if outcome.success {
                    tally.converted += 1;
                } else {
                    tally.failed.push(format!("{}gb/{}/{}", scale, format, table));
                }
            }
        }
    }

    info!(
        "Conversion finished: {} converted, {} failed, {} inputs skipped",
        tally.converted,
        tally.failed.len(),
        tally.skipped
    );

    let summary = format!(
        "{} conversions, {} failed, {} inputs missing",
        tally.converted + tally.failed.len(),
        tally.failed.len(),
        tally.skipped
    );
    if !tally.failed.is_empty() {
        Ok(StepResult::failed(
            PipelineStep::Convert,
            format!("Failed conversions: {}", tally.failed.join(", ")),
        ))
    } else if tally.converted == 0 {
        Ok(StepResult::failed(
            PipelineStep::Convert,
            format!("No input data found under {}", ctx.dirs.data.display()),
        ))
    } else {
        Ok(StepResult::succeeded(PipelineStep::Convert, summary))
    }
}
