//! `upload` step: push formatted tables to both HDFS targets.
//!
//! For each target and each (scale, format) unit: create the remote
//! directory, then upload every table directory. The first failed table
//! aborts that unit. One ingestion metric is recorded per unit.

use super::hdfs::{ensure_ticket, remote_fs, RemoteFs};
use super::StageContext;
use crate::config::settings::remote_fs_kind;
use crate::config::{DataGenSettings, HdfsSettings};
use crate::error::Result;
use crate::metrics::{IngestionMetric, MetricsStore};
use crate::pipeline::{PipelineStep, StepResult};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

pub const HDFS_TARGETS: [&str; 2] = ["simple_auth", "kerberized"];

/// Outcome of one (scale, format) upload unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub scale: u32,
    pub format: String,
    pub success: bool,
    pub tables_uploaded: usize,
    pub seconds: f64,
}

/// Upload one (scale, format) unit to `fs`.
pub async fn upload_unit(
    fs: &dyn RemoteFs,
    formatted_root: &Path,
    target_dir: &str,
    scale: u32,
    format: &str,
    tables: &[String],
) -> UnitOutcome {
    let started = Instant::now();
    let remote_dir = format!("{}/{}gb/{}", target_dir.trim_end_matches('/'), scale, format);
    let local_dir = formatted_root.join(format!("{}gb", scale)).join(format);

    let mut result = UnitOutcome {
        scale,
        format: format.to_string(),
        success: false,
        tables_uploaded: 0,
        seconds: 0.0,
    };

    if fs.mkdirs(&remote_dir).await.success {
        result.success = true;
        for table in tables {
            let local = local_dir.join(table);
            if !local.exists() {
                warn!("Local path {} does not exist, skipping", local.display());
                continue;
            }
            if !fs.put(&local, &remote_dir).await.success {
                error!("Upload of {} to {} failed", table, remote_dir);
                result.success = false;
                break;
            }
            result.tables_uploaded += 1;
        }
    } else {
        error!("Could not create {} via {}", remote_dir, fs.describe());
    }

    result.seconds = started.elapsed().as_secs_f64();
    result
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let kind = remote_fs_kind(ctx.config)?;
    let tables = DataGenSettings::from_config(ctx.config).tables;
    let store = MetricsStore::new(&ctx.dirs.metrics);
    let mut failures = Vec::new();

    for target in HDFS_TARGETS {
        let settings = HdfsSettings::from_config(ctx.config, target);
        info!("Uploading to {} HDFS", target);

        if target == "kerberized" && !ensure_ticket(ctx.runner.as_ref(), &settings).await {
            error!("Failed to obtain a Kerberos ticket for {}", target);
            failures.push(format!("{}: no Kerberos ticket", target));
            continue;
        }

        let fs = remote_fs(kind, &settings, ctx.runner.clone())?;
        for &scale in &ctx.pipeline.scale_factors {
            for format in &ctx.pipeline.formats {
                let unit = upload_unit(
                    fs.as_ref(),
                    &ctx.dirs.formatted_data,
                    &ctx.pipeline.hdfs_target_dir,
                    scale,
                    format,
                    &tables,
                )
                .await;

                let metric = IngestionMetric::new(
                    format.clone(),
                    scale,
                    unit.seconds,
                    unit.success,
                    settings.data_lake(),
                )
                .with_field("tables_uploaded", unit.tables_uploaded.into());
                if let Err(e) = store.record(&metric) {
                    warn!("Could not record ingestion metric: {}", e);
                }

                if !unit.success {
                    failures.push(format!("{}: {}gb/{}", target, scale, format));
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(StepResult::succeeded(
            PipelineStep::Upload,
            format!("Uploaded to {}", HDFS_TARGETS.join(", ")),
        ))
    } else {
        Ok(StepResult::failed(
            PipelineStep::Upload,
            format!("Upload failed for {}", failures.join(", ")),
        ))
    }
}
