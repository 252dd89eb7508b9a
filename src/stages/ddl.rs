//! `ddl` step: one schema per (scale, format) with a CTAS per table over the
//! uploaded HDFS location. Scripts are always written to `logs/ddl_a` and
//! `logs/ddl_b`; with `pipeline.execute_ddl` they are also run on each cluster.

use super::StageContext;
use crate::client::JobClient;
use crate::config::DataGenSettings;
use crate::constants::{CLUSTER_A, CLUSTER_B};
use crate::error::Result;
use crate::pipeline::{PipelineStep, StepResult};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

pub fn schema_name(scale: u32, format: &str) -> String {
    format!("dfs.hdfs.tpcds_{}gb_{}", scale, format)
}

/// Statements for one schema, in execution order. Table names are fully
/// qualified since each `/sql` call runs without session state.
pub fn schema_statements(target_dir: &str, scale: u32, format: &str, tables: &[String]) -> Vec<String> {
    let schema = schema_name(scale, format);
    let base = target_dir.trim_end_matches('/');
    let mut statements = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", schema)];
    statements.extend(tables.iter().map(|table| {
        format!(
            "CREATE OR REPLACE TABLE {}.{} AS\nSELECT * FROM dfs.hdfs.`{}/{}gb/{}/{}/*`",
            schema, table, base, scale, format, table
        )
    }));
    statements
}

/// SQL script text for a schema.
pub fn render_script(schema: &str, statements: &[String]) -> String {
    let mut script = format!("-- DDL for {}\n", schema);
    for statement in statements {
        script.push_str(statement);
        script.push_str(";\n\n");
    }
    script
}

/// Write one `<schema>.sql` per schema under `dir`.
pub fn write_scripts(dir: &Path, schemas: &[(String, Vec<String>)]) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    for (schema, statements) in schemas {
        std::fs::write(dir.join(format!("{}.sql", schema)), render_script(schema, statements))?;
    }
    Ok(schemas.len())
}

/// Execute every schema's statements in order. A schema stops at its first
/// failing statement; the remaining schemas still run.
pub async fn execute_schemas(
    client: &JobClient,
    schemas: &[(String, Vec<String>)],
    timeout: Duration,
    interval: Duration,
) -> bool {
    let mut all_ok = true;
    for (schema, statements) in schemas {
        info!("Executing DDL for {} on {}", schema, client.endpoint());
        for statement in statements {
            match client.execute(statement, timeout, interval).await {
                Ok(status) if status.is_success() => {}
                Ok(status) => {
                    error!(
                        "DDL for {} ended as {}: {}",
                        schema,
                        status.state,
                        status.error_message.as_deref().unwrap_or("")
                    );
                    all_ok = false;
                    break;
                }
                Err(e) => {
                    error!("Failed to execute DDL for {}: {}", schema, e);
                    all_ok = false;
                    break;
                }
            }
        }
    }
    all_ok
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let tables = DataGenSettings::from_config(ctx.config).tables;
    let mut schemas = Vec::new();
    for &scale in &ctx.pipeline.scale_factors {
        for format in &ctx.pipeline.formats {
            schemas.push((
                schema_name(scale, format),
                schema_statements(&ctx.pipeline.hdfs_target_dir, scale, format, &tables),
            ));
        }
    }

    let mut failed_clusters = Vec::new();
    for (cluster, dir_name) in [(CLUSTER_A, "ddl_a"), (CLUSTER_B, "ddl_b")] {
        let dir = ctx.dirs.logs.join(dir_name);
        let written = write_scripts(&dir, &schemas)?;
        info!("Wrote {} DDL scripts for {} to {}", written, cluster, dir.display());

        if !ctx.pipeline.execute_ddl {
            continue;
        }

        let ok = match ctx.connect(cluster).await {
            Ok(client) => {
                execute_schemas(
                    &client,
                    &schemas,
                    ctx.pipeline.ddl_timeout,
                    ctx.pipeline.poll_interval,
                )
                .await
            }
            Err(e) => {
                error!("Could not connect to {}: {}", cluster, e);
                false
            }
        };
        if !ok {
            failed_clusters.push(cluster);
        }
    }

    if failed_clusters.is_empty() {
        let verb = if ctx.pipeline.execute_ddl { "generated and executed" } else { "generated" };
        Ok(StepResult::succeeded(
            PipelineStep::Ddl,
            format!("DDL for {} schemas {}", schemas.len(), verb),
        ))
    } else {
        Ok(StepResult::failed(
            PipelineStep::Ddl,
            format!("DDL failed on {}", failed_clusters.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements() {
        let statements = schema_statements("/benchmark/tpcds/", 1, "parquet", &["store".to_string()]);
        assert_eq!(statements[0], "CREATE SCHEMA IF NOT EXISTS dfs.hdfs.tpcds_1gb_parquet");
        assert_eq!(
            statements[1],
            "CREATE OR REPLACE TABLE dfs.hdfs.tpcds_1gb_parquet.store AS\n\
             SELECT * FROM dfs.hdfs.`/benchmark/tpcds/1gb/parquet/store/*`"
        );
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_scripts_written_per_schema() {
        let dir = tempfile::tempdir().unwrap();
        let schemas = vec![(
            schema_name(10, "csv"),
            schema_statements("/b", 10, "csv", &["item".to_string()]),
        )];
        assert_eq!(write_scripts(&dir.path().join("ddl_a"), &schemas).unwrap(), 1);
        let text =
            std::fs::read_to_string(dir.path().join("ddl_a/dfs.hdfs.tpcds_10gb_csv.sql")).unwrap();
        assert!(text.starts_with("-- DDL for dfs.hdfs.tpcds_10gb_csv\n"));
        assert!(text.contains("CREATE SCHEMA IF NOT EXISTS dfs.hdfs.tpcds_10gb_csv;\n"));
        assert!(text.contains("/b/10gb/csv/item/*`;"));
    }
}
