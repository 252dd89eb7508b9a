//! `data` step: run the TPC-DS generator once per scale factor.

use super::StageContext;
use crate::command::CommandSpec;
use crate::config::DataGenSettings;
use crate::error::{BenchError, Result};
use crate::pipeline::{PipelineStep, StepResult};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// `dsdgen -SCALE <sf> -DIR <out> -FORCE`, run from the generator's directory.
pub fn generator_command(dsdgen: &Path, scale: u32, output_dir: &Path) -> CommandSpec {
    let spec = CommandSpec::process(
        dsdgen.to_string_lossy(),
        [
            "-SCALE".to_string(),
            scale.to_string(),
            "-DIR".to_string(),
            output_dir.to_string_lossy().into_owned(),
            "-FORCE".to_string(),
        ],
    );
    match dsdgen.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => spec.with_cwd(dir),
        None => spec,
    }
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let settings = DataGenSettings::from_config(ctx.config);
    let dsdgen = settings.dsdgen_path.ok_or_else(|| {
        BenchError::Configuration("data_generation.dsdgen_path is not set".to_string())
    })?;
    let dsdgen = resolve_program(&dsdgen)?;

    let mut failed = Vec::new();
    for &scale in &ctx.pipeline.scale_factors {
        let output_dir = absolute(&ctx.dirs.data.join(format!("{}gb", scale)))?;
        let mkdir = ctx
            .runner
            .run(
                &CommandSpec::CreateDir {
                    path: output_dir.clone(),
                },
                &format!("Creating {}", output_dir.display()),
            )
            .await;
        if !mkdir.success {
            failed.push(scale);
            continue;
        }

        info!("Generating {}GB of TPC-DS data into {}", scale, output_dir.display());
        let outcome = ctx
            .runner
            .run(
                &generator_command(&dsdgen, scale, &output_dir),
                &format!("Data generation ({}GB)", scale),
            )
            .await;
        if !outcome.success {
            error!("Data generation failed for scale factor {}", scale);
            failed.push(scale);
        }
    }

    if failed.is_empty() {
        Ok(StepResult::succeeded(
            PipelineStep::Data,
            format!("Generated scale factors {:?}", ctx.pipeline.scale_factors),
        ))
    } else {
        Ok(StepResult::failed(
            PipelineStep::Data,
            format!("Data generation failed for scale factors {:?}", failed),
        ))
    }
}

/// The generator runs from its own directory, so every path handed to it
/// must be absolute.
/// A bare program name is left for `PATH` lookup; anything with a directory
/// component is made absolute.
fn resolve_program(path: &Path) -> Result<PathBuf> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => absolute(path),
        _ => Ok(path.to_path_buf()),
    }
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
