//! Typed views over [`Config`] with their documented defaults.

use super::Config;
use crate::constants::*;
use crate::error::{BenchError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Connection details for one query-service cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub ssl: bool,
}

impl ClusterSettings {
    pub fn from_config(config: &Config, name: &str) -> Self {
        let key = |leaf: &str| format!("clusters.{}.{}", name, leaf);
        Self {
            name: name.to_string(),
            host: config.get_string_or(&key("host"), ""),
            port: config
                .get_u64(&key("port"))
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(DEFAULT_DREMIO_PORT),
            username: config.get_string_or(&key("username"), DEFAULT_DREMIO_USER),
            password: config.get_string_or(&key("password"), ""),
            ssl: config.get_bool(&key("ssl")).unwrap_or(true),
        }
    }

    /// REST base, e.g. `https://host:9047/api/v3`
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}/api/v3", scheme, self.host, self.port)
    }
}

/// Request-layer retry and timeout settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub login_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            request_timeout: Duration::from_secs(30),
            login_timeout: Duration::from_secs(10),
        }
    }
}

impl RetrySettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: config
                .get_u64("client.max_retries")
                .map(|v| v.max(1) as u32)
                .unwrap_or(defaults.max_retries),
            retry_delay: secs_or(config, "client.retry_delay", defaults.retry_delay),
            request_timeout: secs_or(config, "client.request_timeout", defaults.request_timeout),
            login_timeout: secs_or(config, "client.login_timeout", defaults.login_timeout),
        }
    }
}

/// How remote filesystem operations are carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFsKind {
    /// `hadoop fs` subprocess
    Cli,
    /// WebHDFS REST calls
    WebHdfs,
}

impl std::str::FromStr for RemoteFsKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cli" | "hadoop" | "subprocess" => Ok(RemoteFsKind::Cli),
            "webhdfs" | "http" | "native" => Ok(RemoteFsKind::WebHdfs),
            other => Err(BenchError::Configuration(format!(
                "Unknown hdfs.client '{}' (expected cli or webhdfs)",
                other
            ))),
        }
    }
}

/// One HDFS target (`simple_auth` or `kerberized`).
#[derive(Debug, Clone, PartialEq)]
pub struct HdfsSettings {
    pub name: String,
    pub hadoop_bin: String,
    pub hadoop_conf: String,
    pub user: String,
    pub keytab: Option<String>,
    pub principal: Option<String>,
    pub webhdfs_url: Option<String>,
}

impl HdfsSettings {
    pub fn from_config(config: &Config, name: &str) -> Self {
        let key = |leaf: &str| format!("hdfs.{}.{}", name, leaf);
        Self {
            name: name.to_string(),
            hadoop_bin: config.get_string_or(&key("hadoop_bin"), "hadoop"),
            hadoop_conf: config.get_string_or(&key("hadoop_conf"), ""),
            user: config.get_string_or(&key("user"), "hdfs"),
            keytab: config.get_str(&key("keytab")).filter(|s| !s.is_empty()),
            principal: config.get_str(&key("principal")).filter(|s| !s.is_empty()),
            webhdfs_url: config.get_str(&key("webhdfs_url")).filter(|s| !s.is_empty()),
        }
    }

    pub fn is_kerberized(&self) -> bool {
        self.keytab.is_some() && self.principal.is_some()
    }

    /// Identifier recorded as `data_lake` in ingestion metrics.
    pub fn data_lake(&self) -> String {
        format!("hdfs_{}", self.name)
    }
}

/// `pipeline.*` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub base_dir: PathBuf,
    pub scale_factors: Vec<u32>,
    pub formats: Vec<String>,
    pub hdfs_target_dir: String,
    pub query_dir: Option<PathBuf>,
    pub query_timeout: Duration,
    pub ddl_timeout: Duration,
    pub poll_interval: Duration,
    pub iterations: u32,
    pub concurrency: usize,
    pub stop_on_error: bool,
    pub execute_ddl: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let scale_factors = config
            .get_list("pipeline.scale_factors")
            .map(|items| items.iter().filter_map(|s| s.parse().ok()).collect::<Vec<u32>>())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SCALE_FACTORS.to_vec());
        let formats = config
            .get_list("pipeline.formats")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| FILE_FORMATS.iter().map(|s| s.to_string()).collect());

        Self {
            base_dir: PathBuf::from(config.get_string_or("pipeline.base_dir", DEFAULT_BASE_DIR)),
            scale_factors,
            formats,
            hdfs_target_dir: config
                .get_string_or("pipeline.hdfs_target_dir", DEFAULT_HDFS_TARGET_DIR),
            query_dir: config
                .get_str("pipeline.query_dir")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            query_timeout: secs_or(
                config,
                "pipeline.query_timeout",
                Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            ),
            ddl_timeout: secs_or(
                config,
                "pipeline.ddl_timeout",
                Duration::from_secs(DEFAULT_DDL_TIMEOUT_SECS),
            ),
            poll_interval: secs_or(
                config,
                "pipeline.poll_interval",
                Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            ),
            iterations: config.get_u64("pipeline.iterations").unwrap_or(1).max(1) as u32,
            concurrency: config.get_u64("pipeline.concurrency").unwrap_or(1).max(1) as usize,
            stop_on_error: config.get_bool("pipeline.stop_on_error").unwrap_or(true),
            execute_ddl: config.get_bool("pipeline.execute_ddl").unwrap_or(false),
        }
    }
}

/// `data_generation.*` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGenSettings {
    pub dsdgen_path: Option<PathBuf>,
    pub converter_path: Option<String>,
    pub tables: Vec<String>,
}

impl DataGenSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dsdgen_path: config
                .get_str("data_generation.dsdgen_path")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            converter_path: config
                .get_str("data_generation.converter_path")
                .filter(|s| !s.is_empty()),
            tables: config
                .get_list("data_generation.tables")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| TPCDS_TABLES.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// Shared principal used for cross-cluster federation.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossClusterSettings {
    pub user: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl CrossClusterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user: config.get_string_or("cross_cluster.user", "cross_cluster"),
            password: config.get_string_or("cross_cluster.password", ""),
            first_name: config.get_string_or("cross_cluster.first_name", "Cross"),
            last_name: config.get_string_or("cross_cluster.last_name", "Cluster"),
            email: config.get_string_or("cross_cluster.email", "cross.cluster@example.com"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub title: String,
    pub include_charts: bool,
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.get_string_or("reports.title", "Dremio Benchmark Report"),
            include_charts: config.get_bool("reports.include_charts").unwrap_or(true),
        }
    }
}

/// `hdfs.client`, defaulting to the CLI shim.
pub fn remote_fs_kind(config: &Config) -> Result<RemoteFsKind> {
    match config.get_str("hdfs.client") {
        Some(value) if !value.trim().is_empty() => value.parse(),
        _ => Ok(RemoteFsKind::Cli),
    }
}

fn secs_or(config: &Config, key: &str, default: Duration) -> Duration {
    config
        .get_u64(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}
