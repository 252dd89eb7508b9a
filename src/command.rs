//! Command Runner
//!
//! Uniform execution of external processes and local file operations. Every
//! failure is folded into [`CommandOutcome`]; nothing here returns an error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// External program. `env` is layered on top of the inherited environment
    /// for this invocation only.
    Process {
        program: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
    },
    CreateDir {
        path: PathBuf,
    },
    CopyFile {
        from: PathBuf,
        to: PathBuf,
    },
    Remove {
        path: PathBuf,
        recursive: bool,
    },
}

impl CommandSpec {
    pub fn process<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::Process {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add an environment variable to a process invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let CommandSpec::Process { env, .. } = &mut self {
            env.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        if let CommandSpec::Process { cwd, .. } = &mut self {
            *cwd = Some(dir.into());
        }
        self
    }

    /// Command line (or operation) as logged.
    pub fn display(&self) -> String {
        match self {
            CommandSpec::Process { program, args, .. } => {
                std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            CommandSpec::CreateDir { path } => format!("mkdir -p {}", path.display()),
            CommandSpec::CopyFile { from, to } => {
                format!("copy {} {}", from.display(), to.display())
            }
            CommandSpec::Remove { path, recursive } => {
                let flag = if *recursive { "-r " } else { "" };
                format!("rm {}{}", flag, path.display())
            }
        }
    }
}

/// Result of a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Set only when a process actually ran and exited with a code.
    pub exit_code: Option<i32>,
}

impl CommandOutcome {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: Some(stdout.into()),
            stderr: Some(String::new()),
            exit_code: None,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: None,
            stderr: Some(stderr.into()),
            exit_code: None,
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, description: &str) -> CommandOutcome;
}

/// Runs processes with `tokio::process` and file operations with `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }

    async fn run_process(
        &self,
        program: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&Path>,
        description: &str,
    ) -> CommandOutcome {
        let mut command = tokio::process::Command::new(program);
        command.args(args).envs(env).kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        match command.output().await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let exit_code = output.status.code();
                if output.status.success() {
                    info!("{} completed successfully", description);
                    CommandOutcome {
                        success: true,
                        stdout: Some(stdout),
                        stderr: Some(stderr),
                        exit_code,
                    }
                } else {
                    error!("{} failed: {}", description, output.status);
                    error!("stdout: {}", stdout);
                    error!("stderr: {}", stderr);
                    CommandOutcome {
                        success: false,
                        stdout: Some(stdout),
                        stderr: Some(stderr),
                        exit_code,
                    }
                }
            }
            Err(e) => {
                error!("Error running {}: {}", description, e);
                CommandOutcome::failed(e.to_string())
            }
        }
    }

    async fn run_operation(&self, spec: &CommandSpec, description: &str) -> CommandOutcome {
        let result = match spec {
            CommandSpec::CreateDir { path } => {
                tokio::fs::create_dir_all(path).await.map(|_| String::new())
            }
            CommandSpec::CopyFile { from, to } => tokio::fs::copy(from, to)
                .await
                .map(|bytes| format!("{} bytes copied", bytes)),
            CommandSpec::Remove { path, recursive } => {
                let is_dir = tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false);
                let removed = match (is_dir, *recursive) {
                    (true, true) => tokio::fs::remove_dir_all(path).await,
                    (true, false) => tokio::fs::remove_dir(path).await,
                    (false, _) => tokio::fs::remove_file(path).await,
                };
                removed.map(|_| String::new())
            }
            CommandSpec::Process { program, .. } => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a process, not a file operation", program),
            )),
        };

        match result {
            Ok(stdout) => {
                info!("{} completed successfully", description);
                CommandOutcome::ok(stdout)
            }
            Err(e) => {
                error!("{} failed: {}", description, e);
                CommandOutcome::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec, description: &str) -> CommandOutcome {
        info!("Running {}...", description);
        debug!("Command: {}", spec.display());

        match spec {
            CommandSpec::Process {
                program,
                args,
                env,
                cwd,
            } => {
                self.run_process(program, args, env, cwd.as_deref(), description)
                    .await
            }
            _ => self.run_operation(spec, description).await,
        }
    }
}
