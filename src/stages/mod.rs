//! Step handlers.
//!
//! [`StageRunner`] is the production [`StepExecutor`]: it resolves the typed
//! settings for each step and hands them to the stage module.

pub mod benchmark;
pub mod convert;
pub mod cross;
pub mod data_gen;
pub mod ddl;
pub mod hdfs;
pub mod report;
pub mod upload;

use crate::client::{Credentials, HttpQueryService, JobClient, QueryService};
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::config::{ClusterSettings, Config, PipelineSettings, RetrySettings};
use crate::constants::*;
use crate::error::Result;
use crate::pipeline::{PipelineStep, StepExecutor, StepResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Working directories under `pipeline.base_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDirs {
    pub base: PathBuf,
    pub data: PathBuf,
    pub formatted_data: PathBuf,
    pub logs: PathBuf,
    pub results: PathBuf,
    pub reports: PathBuf,
    pub metrics: PathBuf,
}

impl PipelineDirs {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            data: base.join(DATA_DIR),
            formatted_data: base.join(FORMATTED_DATA_DIR),
            logs: base.join(LOGS_DIR),
            results: base.join(RESULTS_DIR),
            reports: base.join(REPORTS_DIR),
            metrics: base.join(METRICS_DIR),
        }
    }

    pub fn create_all(&self) -> Result<()> {
        for dir in [
            &self.data,
            &self.formatted_data,
            &self.logs,
            &self.results,
            &self.reports,
            &self.metrics,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Builds the transport for a cluster.
pub trait ServiceProvider: Send + Sync {
    fn service(&self, cluster: &ClusterSettings, retry: &RetrySettings) -> Result<Arc<dyn QueryService>>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpServiceProvider;

impl ServiceProvider for HttpServiceProvider {
    fn service(&self, cluster: &ClusterSettings, retry: &RetrySettings) -> Result<Arc<dyn QueryService>> {
        Ok(Arc::new(HttpQueryService::from_cluster(cluster, retry)?))
    }
}

/// Everything a stage needs for one invocation.
pub struct StageContext<'a> {
    pub config: &'a Config,
    pub pipeline: PipelineSettings,
    pub dirs: PipelineDirs,
    pub runner: Arc<dyn CommandRunner>,
    pub services: &'a dyn ServiceProvider,
}

impl<'a> StageContext<'a> {
    pub fn new(
        config: &'a Config,
        runner: Arc<dyn CommandRunner>,
        services: &'a dyn ServiceProvider,
    ) -> Self {
        let pipeline = PipelineSettings::from_config(config);
        let dirs = PipelineDirs::new(&pipeline.base_dir);
        Self {
            config,
            pipeline,
            dirs,
            runner,
            services,
        }
    }

    /// Authenticated client for `clusters.<name>`.
    pub async fn connect(&self, name: &str) -> Result<JobClient> {
        let cluster = ClusterSettings::from_config(self.config, name);
        self.connect_as(&cluster, &Credentials::new(&cluster.username, &cluster.password))
            .await
    }

    pub async fn connect_as(&self, cluster: &ClusterSettings, credentials: &Credentials) -> Result<JobClient> {
        let retry = RetrySettings::from_config(self.config);
        let service = self.services.service(cluster, &retry)?;
        JobClient::connect(service, credentials).await
    }
}

/// Production step executor.
pub struct StageRunner {
    runner: Arc<dyn CommandRunner>,
    services: Box<dyn ServiceProvider>,
}

impl Default for StageRunner {
    fn default() -> Self {
        Self::new(Arc::new(SystemCommandRunner::new()), Box::new(HttpServiceProvider))
    }
}

impl StageRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, services: Box<dyn ServiceProvider>) -> Self {
        Self { runner, services }
    }
}

#[async_trait]
impl StepExecutor for StageRunner {
    async fn execute(&self, step: PipelineStep, config: &Config) -> Result<StepResult> {
        let ctx = StageContext::new(config, self.runner.clone(), &*self.services);
        ctx.dirs.create_all()?;
        info!("Working directory: {}", ctx.dirs.base.display());

        match step {
            PipelineStep::Data => data_gen::run(&ctx).await,
            PipelineStep::Convert => convert::run(&ctx).await,
            PipelineStep::Upload => upload::run(&ctx).await,
            PipelineStep::Ddl => ddl::run(&ctx).await,
            PipelineStep::Cross => cross::run(&ctx).await,
            PipelineStep::Benchmark => benchmark::run(&ctx).await,
            PipelineStep::Report => report::run(&ctx).await,
        }
    }
}
