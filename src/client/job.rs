//! Job Client
//!
//! Submit SQL and poll `GET /job/{id}` until the job reaches a terminal state.
//! `poll` never returns an error: deadline expiry and transport failures come
//! back as the synthetic `TIMEOUT` and `ERROR` states.

use crate::client::service::{EntityOutcome, JobProfile, QueryService};
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Job lifecycle. `Timeout` and `Error` are produced locally, never by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
    Timeout,
    Error,
}

impl JobState {
    /// Map a remote `jobState`. Unrecognised values are treated as still running.
    pub fn from_remote(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => JobState::Completed,
            "FAILED" => JobState::Failed,
            "CANCELED" | "CANCELLED" => JobState::Canceled,
            "PENDING" | "NOT_SUBMITTED" | "STARTING" | "QUEUED" | "ENQUEUED" | "PLANNING"
            | "METADATA_RETRIEVAL" | "ENGINE_START" | "EXECUTION_PLANNING" => JobState::Pending,
            _ => JobState::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending | JobState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Canceled => "CANCELED",
            JobState::Timeout => "TIMEOUT",
            JobState::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of one job as returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub error_message: Option<String>,
    pub row_count: Option<u64>,
    pub profile: Option<JobProfile>,
    /// Number of `GET /job/{id}` calls made while polling.
    pub status_requests: u32,
    pub elapsed: Duration,
}

impl JobStatus {
    fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            state: JobState::Pending,
            error_message: None,
            row_count: None,
            profile: None,
            status_requests: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Authenticated handle on one query service. The token is fixed after
/// login, so a client can be shared across concurrent polls.
pub struct JobClient {
    service: Arc<dyn QueryService>,
    token: Option<String>,
}

impl JobClient {
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self {
            service,
            token: None,
        }
    }

    /// Build and authenticate in one go.
    pub async fn connect(service: Arc<dyn QueryService>, credentials: &Credentials) -> Result<Self> {
        let mut client = Self::new(service);
        client.authenticate(credentials).await?;
        Ok(client)
    }

    pub fn endpoint(&self) -> String {
        self.service.endpoint()
    }

    /// Exchange credentials for a token. Not retried.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<String> {
        match self
            .service
            .login(&credentials.username, &credentials.password)
            .await
        {
            Ok(token) => {
                info!("Authenticated with {}", self.service.endpoint());
                self.token = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                error!("Authentication against {} failed: {}", self.service.endpoint(), e);
                Err(match e {
                    BenchError::Authentication(_) => e,
                    other => BenchError::Authentication(other.to_string()),
                })
            }
        }
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| BenchError::Authentication("client has not authenticated".to_string()))
    }

    /// Submit SQL and return the job id.
    pub async fn submit(&self, sql: &str) -> Result<String> {
        let token = self.token()?;
        match self.service.submit(token, sql).await {
            Ok(job_id) => {
                debug!("Submitted job {}", job_id);
                Ok(job_id)
            }
            Err(e) => {
                error!("Failed to submit query: {}", e);
                Err(BenchError::Submission(e.to_string()))
            }
        }
    }

    /// Poll at a fixed `interval` until terminal or until `timeout` elapses.
    pub async fn poll(&self, job_id: &str, timeout: Duration, interval: Duration) -> JobStatus {
        let started = Instant::now();
        let mut status = JobStatus::new(job_id);

        let token = match self.token() {
            Ok(token) => token,
            Err(e) => {
                status.state = JobState::Error;
                status.error_message = Some(e.to_string());
                return status;
            }
        };

        loop {
            status.status_requests += 1;
            // retries inside job_status must not outlive the poll deadline
            let remaining = timeout.saturating_sub(started.elapsed());
            let reply = match tokio::time::timeout(remaining, self.service.job_status(token, job_id)).await {
                Ok(reply) => reply,
                Err(_) => {
                    warn!("Job {} status request outlived the {:?} deadline", job_id, timeout);
                    status.state = JobState::Timeout;
                    status.error_message = Some(format!("Job did not finish within {:?}", timeout));
                    break;
                }
            };
            match reply {
                Ok(response) => {
                    let observed = JobState::from_remote(&response.job_state);
                    // never step back from RUNNING to a queued state
                    if !(status.state == JobState::Running && observed == JobState::Pending) {
                        status.state = observed;
                    }
                    status.error_message = response.error_message;
                    status.row_count = response.row_count.or(status.row_count);
                }
                Err(e) => {
                    warn!("Job {} status request failed: {}", job_id, e);
                    status.state = JobState::Error;
                    status.error_message = Some(e.to_string());
                }
            }

            if status.state.is_terminal() {
                break;
            }

            if started.elapsed() > timeout {
                warn!("Job {} did not finish within {:?}", job_id, timeout);
                status.state = JobState::Timeout;
                status.error_message = Some(format!("Job did not finish within {:?}", timeout));
                break;
            }

            tokio::time::sleep(interval).await;
        }

        status.elapsed = started.elapsed();
        debug!(
            "Job {} finished as {} after {} status requests",
            job_id, status.state, status.status_requests
        );
        status
    }

    /// Submit + poll, then fetch the profile for completed jobs. `elapsed` on
    /// the returned status covers submit and poll only, not the profile fetch.
    pub async fn execute(&self, sql: &str, timeout: Duration, interval: Duration) -> Result<JobStatus> {
        let started = Instant::now();
        let job_id = self.submit(sql).await?;
        let mut status = self.poll(&job_id, timeout, interval).await;
        status.elapsed = started.elapsed();

        if status.state == JobState::Completed {
            match self.profile(&job_id).await {
                Ok(profile) => status.profile = Some(profile),
                Err(e) => warn!("Could not fetch profile for job {}: {}", job_id, e),
            }
        } else if let Some(message) = &status.error_message {
            warn!("Job {} ended as {}: {}", job_id, status.state, message);
        }

        Ok(status)
    }

    pub async fn profile(&self, job_id: &str) -> Result<JobProfile> {
        let token = self.token()?;
        self.service.job_profile(token, job_id).await
    }

    /// POST a catalog entity or user; "already exists" is reported, not raised.
    pub async fn create_entity(&self, path: &str, body: &serde_json::Value) -> Result<EntityOutcome> {
        let token = self.token()?;
        self.service.create_entity(token, path, body).await
    }
}
