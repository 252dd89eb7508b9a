//! `benchmark` step: time every query file against each cluster.
//!
//! Iterations run one after another; within an iteration queries run on a
//! bounded worker pool. Each execution yields one [`BenchmarkRecord`], failed
//! or not. Three suites are run: cluster A, cluster B and the
//! `cross_cluster/` queries against A.

use super::StageContext;
use crate::client::JobClient;
use crate::constants::*;
use crate::error::{BenchError, Result};
use crate::metrics::records::write_records;
use crate::metrics::BenchmarkRecord;
use crate::pipeline::{PipelineStep, StepResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub const CROSS_CLUSTER_QUERY_DIR: &str = "cross_cluster";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFile {
    pub name: String,
    pub sql: String,
}

/// `*.sql` files directly under `dir`, named by file stem, sorted by name.
pub fn load_queries(dir: &Path) -> Result<Vec<QueryFile>> {
    let mut queries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
            continue;
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sql = std::fs::read_to_string(&path)?;
        queries.push(QueryFile { name, sql });
    }
    queries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(queries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkOptions {
    pub iterations: u32,
    pub concurrency: usize,
    pub timeout: Duration,
    pub interval: Duration,
}

/// Run every query `iterations` times with at most `concurrency` in flight.
pub async fn run_queries(
    client: Arc<JobClient>,
    queries: &[QueryFile],
    options: BenchmarkOptions,
) -> Vec<BenchmarkRecord> {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut records = Vec::with_capacity(queries.len() * options.iterations as usize);

    for iteration in 1..=options.iterations {
        info!("Starting iteration {} of {}", iteration, options.iterations);
        let mut join_set: JoinSet<BenchmarkRecord> = JoinSet::new();

        for query in queries {
            let client = client.clone();
            let semaphore = semaphore.clone();
            let query = query.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                info!("Running query {}", query.name);
                let started = Instant::now();
                let outcome = client.execute(&query.sql, options.timeout, options.interval).await;
                match outcome {
                    Ok(status) => {
                        // submit + poll only; the profile fetch is not part of the query time
                        let elapsed = status.elapsed.as_secs_f64();
                        info!("Query {} finished as {} in {:.2} seconds", query.name, status.state, elapsed);
                        BenchmarkRecord::from_status(&query.name, &query.sql, iteration, elapsed, &status)
                    }
                    Err(e) => {
                        error!("Error running query {}: {}", query.name, e);
                        let elapsed = started.elapsed().as_secs_f64();
                        BenchmarkRecord::submission_failed(
                            &query.name,
                            &query.sql,
                            iteration,
                            elapsed,
                            &e.to_string(),
                        )
                    }
                }
            });
        }

        let mut batch = Vec::with_capacity(queries.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(record) => batch.push(record),
                Err(e) => error!("Benchmark task failed: {}", e),
            }
        }
        batch.sort_by(|a, b| a.query_name.cmp(&b.query_name));
        records.extend(batch);
    }

    records
}

/// One (cluster, query directory, results file) combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub label: &'static str,
    pub cluster: &'static str,
    pub query_dir: PathBuf,
    pub output: PathBuf,
    /// Optional suites are skipped when their directory is absent or empty.
    pub optional: bool,
}

pub fn suites(query_dir: &Path, results_dir: &Path) -> Vec<Suite> {
    vec![
        Suite {
            label: "Dremio A",
            cluster: CLUSTER_A,
            query_dir: query_dir.to_path_buf(),
            output: results_dir.join(RESULTS_A_FILE),
            optional: false,
        },
        Suite {
            label: "Dremio B",
            cluster: CLUSTER_B,
            query_dir: query_dir.to_path_buf(),
            output: results_dir.join(RESULTS_B_FILE),
            optional: false,
        },
        Suite {
            label: "cross-cluster",
            cluster: CLUSTER_A,
            query_dir: query_dir.join(CROSS_CLUSTER_QUERY_DIR),
            output: results_dir.join(RESULTS_CROSS_FILE),
            optional: true,
        },
    ]
}

/// Returns `Ok(None)` when an optional suite was skipped.
async fn run_suite(ctx: &StageContext<'_>, suite: &Suite, options: BenchmarkOptions) -> Result<Option<usize>> {
    if !suite.query_dir.is_dir() {
        if suite.optional {
            warn!("{} query directory {} not found, skipping", suite.label, suite.query_dir.display());
            return Ok(None);
        }
        return Err(BenchError::Configuration(format!(
            "Query directory {} does not exist",
            suite.query_dir.display()
        )));
    }

    let queries = load_queries(&suite.query_dir)?;
    if queries.is_empty() {
        if suite.optional {
            warn!("No queries in {}, skipping {}", suite.query_dir.display(), suite.label);
            return Ok(None);
        }
        return Err(BenchError::Configuration(format!(
            "No .sql files found in {}",
            suite.query_dir.display()
        )));
    }

    info!("Benchmarking {} with {} queries", suite.label, queries.len());
    let client = Arc::new(ctx.connect(suite.cluster).await?);
    let records = run_queries(client, &queries, options).await;
    write_records(&suite.output, &records)?;
    info!("Wrote {} results to {}", records.len(), suite.output.display());
    Ok(Some(records.len()))
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let query_dir = ctx
        .pipeline
        .query_dir
        .clone()
        .ok_or_else(|| BenchError::Configuration("pipeline.query_dir is not set".to_string()))?;
    let options = BenchmarkOptions {
        iterations: ctx.pipeline.iterations,
        concurrency: ctx.pipeline.concurrency,
        timeout: ctx.pipeline.query_timeout,
        interval: ctx.pipeline.poll_interval,
    };

    let mut failed = Vec::new();
    let mut written = Vec::new();
    for suite in suites(&query_dir, &ctx.dirs.results) {
        match run_suite(ctx, &suite, options).await {
            Ok(Some(count)) => written.push(format!("{} ({} runs)", suite.label, count)),
            Ok(None) => {}
            Err(e) => {
                error!("Benchmarking {} failed: {}", suite.label, e);
                failed.push(suite.label);
            }
        }
    }

    if failed.is_empty() {
        Ok(StepResult::succeeded(
            PipelineStep::Benchmark,
            format!("Benchmarked {}", written.join(", ")),
        ))
    } else {
        Ok(StepResult::failed(
            PipelineStep::Benchmark,
            format!("Benchmark failed for {}", failed.join(", ")),
        ))
    }
}
