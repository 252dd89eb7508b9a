//! Remote filesystem access for the upload step.
//!
//! Two fixed variants behind [`RemoteFs`], chosen once from `hdfs.client`:
//! the `hadoop fs` subprocess shim and a WebHDFS REST client. Both report
//! through [`CommandOutcome`] so the upload logic never branches on which
//! one is in use.

use crate::command::{CommandOutcome, CommandRunner, CommandSpec};
use crate::config::{HdfsSettings, RemoteFsKind};
use crate::error::{BenchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// `mkdir -p` on the remote side.
    async fn mkdirs(&self, remote_dir: &str) -> CommandOutcome;

    /// Copy a local file or directory into `remote_dir`, overwriting.
    async fn put(&self, local: &Path, remote_dir: &str) -> CommandOutcome;

    fn describe(&self) -> String;
}

/// Build the configured variant for one HDFS target.
pub fn remote_fs(
    kind: RemoteFsKind,
    settings: &HdfsSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn RemoteFs>> {
    match kind {
        RemoteFsKind::Cli => Ok(Box::new(HadoopCliFs::new(settings.clone(), runner))),
        RemoteFsKind::WebHdfs => {
            let url = settings.webhdfs_url.clone().ok_or_else(|| {
                BenchError::Configuration(format!(
                    "hdfs.{}.webhdfs_url is required when hdfs.client is webhdfs",
                    settings.name
                ))
            })?;
            if settings.is_kerberized() {
                warn!(
                    "WebHDFS client does not negotiate Kerberos; {} must accept user.name",
                    settings.name
                );
            }
            Ok(Box::new(WebHdfsFs::new(&url, &settings.user)?))
        }
    }
}

/// `hadoop fs` through the Command Runner. `HADOOP_CONF_DIR` (and
/// `HADOOP_USER_NAME` for simple auth) are passed per invocation.
pub struct HadoopCliFs {
    settings: HdfsSettings,
    runner: Arc<dyn CommandRunner>,
}

impl HadoopCliFs {
    pub fn new(settings: HdfsSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self { settings, runner }
    }

    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::process(
            self.settings.hadoop_bin.clone(),
            std::iter::once("fs".to_string()).chain(args.into_iter().map(Into::into)),
        )
        .with_env("HADOOP_CONF_DIR", self.settings.hadoop_conf.clone());
        if !self.settings.is_kerberized() {
            spec = spec.with_env("HADOOP_USER_NAME", self.settings.user.clone());
        }
        spec
    }
}

#[async_trait]
impl RemoteFs for HadoopCliFs {
    async fn mkdirs(&self, remote_dir: &str) -> CommandOutcome {
        let spec = self.command(["-mkdir", "-p", remote_dir]);
        self.runner
            .run(&spec, &format!("Create HDFS directory {}", remote_dir))
            .await
    }

    async fn put(&self, local: &Path, remote_dir: &str) -> CommandOutcome {
        let spec = self.command([
            "-put".to_string(),
            "-f".to_string(),
            local.to_string_lossy().into_owned(),
            format!("{}/", remote_dir.trim_end_matches('/')),
        ]);
        let name = local.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.runner.run(&spec, &format!("Upload {}", name)).await
    }

    fn describe(&self) -> String {
        format!("hadoop fs ({})", self.settings.name)
    }
}

const WEBHDFS_PREFIX: &str = "/webhdfs/v1";

/// WebHDFS over reqwest.
pub struct WebHdfsFs {
    base_url: String,
    user: String,
    client: Client,
}

impl WebHdfsFs {
    /// `base_url` is the namenode HTTP address; `/webhdfs/v1` is appended when missing.
    pub fn new(base_url: &str, user: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BenchError::Configuration(format!("Failed to create WebHDFS client: {}", e)))?;
        let mut base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.ends_with(WEBHDFS_PREFIX) {
            base_url.push_str(WEBHDFS_PREFIX);
        }
        Ok(Self {
            base_url,
            user: user.to_string(),
            client,
        })
    }

    pub fn op_url(&self, remote_path: &str, op: &str) -> String {
        format!(
            "{}/{}?op={}&user.name={}",
            self.base_url,
            remote_path.trim_start_matches('/'),
            op,
            self.user
        )
    }

    async fn mkdirs_inner(&self, remote_dir: &str) -> Result<()> {
        let response = self
            .client
            .put(self.op_url(remote_dir, "MKDIRS"))
            .send()
            .await
            .map_err(|e| BenchError::from_transport("WebHDFS MKDIRS", &e))?;
        check(response).await
    }

    async fn create_file(&self, local: &Path, remote_file: &str) -> Result<()> {
        let body = tokio::fs::read(local).await?;
        let url = format!("{}&overwrite=true", self.op_url(remote_file, "CREATE"));
        debug!("WebHDFS CREATE {} ({} bytes)", remote_file, body.len());
        let response = self
            .client
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(|e| BenchError::from_transport("WebHDFS CREATE", &e))?;
        check(response).await
    }

    async fn put_inner(&self, local: &Path, remote_dir: &str) -> Result<usize> {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BenchError::Configuration(format!("Bad local path {}", local.display())))?;
        let root = format!("{}/{}", remote_dir.trim_end_matches('/'), name);

        if local.is_file() {
            self.create_file(local, &root).await?;
            return Ok(1);
        }

        let mut uploaded = 0;
        for (file, relative) in walk_files(local)? {
            let remote_file = format!("{}/{}", root, relative);
            if let Some((parent, _)) = remote_file.rsplit_once('/') {
                self.mkdirs_inner(parent).await?;
            }
            self.create_file(&file, &remote_file).await?;
            uploaded += 1;
        }
        Ok(uploaded)
    }
}

async fn check(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(BenchError::Http {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

fn outcome(result: Result<String>, description: &str) -> CommandOutcome {
    match result {
        Ok(message) => {
            info!("{} completed successfully", description);
            CommandOutcome::ok(message)
        }
        Err(e) => {
            warn!("{} failed: {}", description, e);
            CommandOutcome::failed(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteFs for WebHdfsFs {
    async fn mkdirs(&self, remote_dir: &str) -> CommandOutcome {
        let result = self.mkdirs_inner(remote_dir).await.map(|_| String::new());
        outcome(result, &format!("WebHDFS mkdir {}", remote_dir))
    }

    async fn put(&self, local: &Path, remote_dir: &str) -> CommandOutcome {
        let result = self
            .put_inner(local, remote_dir)
            .await
            .map(|n| format!("{} files uploaded", n));
        outcome(result, &format!("WebHDFS upload {}", local.display()))
    }

    fn describe(&self) -> String {
        format!("WebHDFS ({})", self.base_url)
    }
}

/// Regular files under `root` with their `/`-separated relative paths.
fn walk_files(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((path, relative));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Result of `klist -s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Present,
    Absent,
    /// `klist` could not be run at all.
    Undeterminable,
}

pub async fn check_ticket(runner: &dyn CommandRunner) -> TicketStatus {
    let outcome = runner
        .run(
            &CommandSpec::process("klist", ["-s"]),
            "Check Kerberos ticket",
        )
        .await;
    match (outcome.success, outcome.exit_code) {
        (true, _) => TicketStatus::Present,
        (false, Some(_)) => TicketStatus::Absent,
        (false, None) => TicketStatus::Undeterminable,
    }
}

/// Make sure a valid ticket exists, running `kinit -kt` when needed.
pub async fn ensure_ticket(runner: &dyn CommandRunner, settings: &HdfsSettings) -> bool {
    let (keytab, principal) = match (&settings.keytab, &settings.principal) {
        (Some(keytab), Some(principal)) => (keytab, principal),
        _ => {
            warn!("No keytab/principal configured for {}", settings.name);
            return false;
        }
    };

    match check_ticket(runner).await {
        TicketStatus::Present => {
            info!("Valid Kerberos ticket found");
            return true;
        }
        TicketStatus::Absent => info!("No valid Kerberos ticket, obtaining one for {}", principal),
        TicketStatus::Undeterminable => {
            warn!("Could not determine Kerberos ticket state, attempting kinit")
        }
    }

    runner
        .run(
            &CommandSpec::process("kinit", ["-kt", keytab.as_str(), principal.as_str()]),
            "Obtain Kerberos ticket",
        )
        .await
        .success
}
