use anyhow::Result;
use clap::Parser;
use dremio_bench::config::Config;
use dremio_bench::constants::{DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILE};
use dremio_bench::logging;
use dremio_bench::pipeline::{Orchestrator, PipelineStep};
use dremio_bench::stages::StageRunner;
use serde_yaml::Value;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dremio-bench")]
#[command(about = "TPC-DS benchmark pipeline for Dremio clusters")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Steps to run: data, convert, upload, ddl, cross, benchmark, report or all
    #[arg(short, long, num_args = 1.., default_value = "all")]
    steps: Vec<String>,

    /// Override pipeline.base_dir
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Execute generated DDL against both clusters
    #[arg(long)]
    execute_ddl: bool,

    /// Keep running later steps after a failure
    #[arg(long)]
    continue_on_error: bool,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level, Some(args.log_file.as_path()))?;

    let mut config = Config::load(&args.config);
    if let Some(base_dir) = &args.base_dir {
        config.set("pipeline.base_dir", Value::String(base_dir.display().to_string()));
    }
    if args.execute_ddl {
        config.set("pipeline.execute_ddl", Value::Bool(true));
    }

    let steps = PipelineStep::parse_list(&args.steps)?;
    info!(
        "Running steps: {}",
        steps.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    );

    let mut orchestrator = Orchestrator::new(config, StageRunner::default());
    if args.continue_on_error {
        orchestrator = orchestrator.with_stop_on_error(false);
    }

    if !orchestrator.run(&steps).await {
        error!("Pipeline finished with failures");
        std::process::exit(1);
    }
    info!("Pipeline completed successfully");
    Ok(())
}
