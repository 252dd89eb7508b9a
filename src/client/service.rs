//! Query service transport
//!
//! The [`QueryService`] trait is the seam between the job state machine and
//! the Dremio REST API (`/api/v3`). [`HttpQueryService`] is the reqwest
//! implementation; every call except login goes through the [`RetryPolicy`].

use crate::client::retry::RetryPolicy;
use crate::config::{ClusterSettings, RetrySettings};
use crate::error::{BenchError, Result, CONNECTIVITY_CHECKLIST};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "userName")]
    user_name: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct SqlRequest<'a> {
    sql: &'a str,
}

#[derive(Debug, Deserialize)]
struct SqlResponse {
    id: String,
}

/// `GET /job/{id}` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusResponse {
    #[serde(rename = "jobState")]
    pub job_state: String,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
    #[serde(rename = "rowCount", default)]
    pub row_count: Option<u64>,
}

impl JobStatusResponse {
    pub fn new(job_state: impl Into<String>) -> Self {
        Self {
            job_state: job_state.into(),
            error_message: None,
            row_count: None,
        }
    }
}

/// `GET /job/{id}/profile` body; every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProfile {
    #[serde(rename = "memoryUsed", default)]
    pub memory_used: Option<f64>,
    #[serde(rename = "cpuUsed", default)]
    pub cpu_used: Option<f64>,
    #[serde(rename = "ioUsed", default)]
    pub io_used: Option<f64>,
    #[serde(rename = "outputRecords", default)]
    pub output_records: Option<u64>,
}

/// Result of creating a catalog entity or user.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOutcome {
    Created(serde_json::Value),
    /// HTTP 409
    AlreadyExists,
}

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, username: &str, password: &str) -> Result<String>;

    /// Submit SQL, returning the job id.
    async fn submit(&self, token: &str, sql: &str) -> Result<String>;

    async fn job_status(&self, token: &str, job_id: &str) -> Result<JobStatusResponse>;

    async fn job_profile(&self, token: &str, job_id: &str) -> Result<JobProfile>;

    /// POST a JSON entity to `path` (`/catalog`, `/user`).
    async fn create_entity(
        &self,
        token: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<EntityOutcome>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// Dremio REST client over reqwest.
pub struct HttpQueryService {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
    login_timeout: Duration,
}

impl HttpQueryService {
    /// `base_url` is the API root, e.g. `http://host:9047/api/v3`.
    pub fn new(base_url: impl Into<String>, settings: &RetrySettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BenchError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::from(settings),
            login_timeout: settings.login_timeout,
        })
    }

    pub fn from_cluster(cluster: &ClusterSettings, settings: &RetrySettings) -> Result<Self> {
        Self::new(cluster.base_url(), settings)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_header(token: &str) -> String {
        format!("_dremio{}", token)
    }

    /// One attempt: send, check status, decode JSON.
    async fn send_json<T: DeserializeOwned + Send>(request: RequestBuilder, label: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| BenchError::from_transport(label, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BenchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BenchError::Protocol(format!("{}: invalid response body: {}", label, e)))
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let url = self.url("login");
        info!("Authenticating as {} against {}", username, self.base_url);

        let request = self
            .client
            .post(&url)
            .timeout(self.login_timeout)
            .json(&LoginRequest {
                user_name: username,
                password,
            });

        match Self::send_json::<LoginResponse>(request, "login").await {
            Ok(body) => Ok(body.token),
            Err(BenchError::Http { status, body }) => Err(BenchError::Authentication(format!(
                "Login to {} rejected with HTTP {}: {}\n{}",
                self.base_url, status, body, CONNECTIVITY_CHECKLIST
            ))),
            Err(e) => Err(BenchError::Authentication(format!(
                "Could not reach {}: {}\n{}",
                self.base_url, e, CONNECTIVITY_CHECKLIST
            ))),
        }
    }

    async fn submit(&self, token: &str, sql: &str) -> Result<String> {
        let url = self.url("sql");
        let auth = Self::auth_header(token);
        debug!("Submitting SQL: {}", sql);

        let response: SqlResponse = self
            .retry
            .run("submit", || {
                let request = self
                    .client
                    .post(&url)
                    .header("Authorization", &auth)
                    .json(&SqlRequest { sql });
                Self::send_json(request, "submit")
            })
            .await?;
        Ok(response.id)
    }

    async fn job_status(&self, token: &str, job_id: &str) -> Result<JobStatusResponse> {
        let url = self.url(&format!("job/{}", job_id));
        let auth = Self::auth_header(token);

        self.retry
            .run("job status", || {
                let request = self.client.get(&url).header("Authorization", &auth);
                Self::send_json(request, "job status")
            })
            .await
    }

    async fn job_profile(&self, token: &str, job_id: &str) -> Result<JobProfile> {
        let url = self.url(&format!("job/{}/profile", job_id));
        let auth = Self::auth_header(token);

        self.retry
            .run("job profile", || {
                let request = self.client.get(&url).header("Authorization", &auth);
                Self::send_json(request, "job profile")
            })
            .await
    }

    async fn create_entity(
        &self,
        token: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<EntityOutcome> {
        let url = self.url(path);
        let auth = Self::auth_header(token);

        let result = self
            .retry
            .run(path, || {
                let request = self
                    .client
                    .post(&url)
                    .header("Authorization", &auth)
                    .json(body);
                Self::send_json::<serde_json::Value>(request, path)
            })
            .await;

        match result {
            Ok(created) => Ok(EntityOutcome::Created(created)),
            Err(BenchError::Http { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                Ok(EntityOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}
