#![allow(dead_code)]

use async_trait::async_trait;
use dremio_bench::client::{EntityOutcome, JobProfile, JobStatusResponse, QueryService};
use dremio_bench::config::{ClusterSettings, RetrySettings};
use dremio_bench::error::{BenchError, Result};
use dremio_bench::stages::ServiceProvider;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply to `GET /job/{id}`.
#[derive(Debug, Clone)]
pub enum StatusReply {
    State(&'static str),
    Failed(&'static str, &'static str),
    TransportError(&'static str),
}

/// In-memory query service that replays a status script and counts calls.
pub struct ScriptedService {
    statuses: Mutex<VecDeque<StatusReply>>,
    /// Returned once the script is exhausted.
    fallback: &'static str,
    pub submit_error: Option<&'static str>,
    pub login_error: Option<&'static str>,
    /// Job id handed out by `submit`; defaults to `job-{n}`.
    pub fixed_job_id: Option<&'static str>,
    pub status_delay: Duration,
    pub profile_delay: Duration,
    pub submitted: Mutex<Vec<String>>,
    pub entities: Mutex<Vec<(String, serde_json::Value)>>,
    pub status_calls: AtomicU32,
    pub profile_calls: AtomicU32,
}

impl ScriptedService {
    pub fn new(script: Vec<StatusReply>, fallback: &'static str) -> Self {
        Self {
            statuses: Mutex::new(script.into()),
            fallback,
            submit_error: None,
            login_error: None,
            fixed_job_id: None,
            status_delay: Duration::ZERO,
            profile_delay: Duration::ZERO,
            submitted: Mutex::new(Vec::new()),
            entities: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
            profile_calls: AtomicU32::new(0),
        }
    }

    /// Every job completes on the first status request.
    pub fn completing() -> Self {
        Self::new(Vec::new(), "COMPLETED")
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> u32 {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryService for ScriptedService {
    async fn login(&self, _username: &str, _password: &str) -> Result<String> {
        match self.login_error {
            Some(message) => Err(BenchError::Connection(message.to_string())),
            None => Ok("token".to_string()),
        }
    }

    async fn submit(&self, _token: &str, sql: &str) -> Result<String> {
        if let Some(message) = self.submit_error {
            return Err(BenchError::Http {
                status: 400,
                body: message.to_string(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(sql.to_string());
        match self.fixed_job_id {
            Some(job_id) => Ok(job_id.to_string()),
            None => Ok(format!("job-{}", submitted.len())),
        }
    }

    async fn job_status(&self, _token: &str, _job_id: &str) -> Result<JobStatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        let next = self.statuses.lock().unwrap().pop_front();
        match next.unwrap_or(StatusReply::State(self.fallback)) {
            StatusReply::State(state) => Ok(JobStatusResponse::new(state)),
            StatusReply::Failed(state, message) => {
                let mut response = JobStatusResponse::new(state);
                response.error_message = Some(message.to_string());
                Ok(response)
            }
            StatusReply::TransportError(message) => Err(BenchError::Connection(message.to_string())),
        }
    }

    async fn job_profile(&self, _token: &str, _job_id: &str) -> Result<JobProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if !self.profile_delay.is_zero() {
            tokio::time::sleep(self.profile_delay).await;
        }
        Ok(JobProfile {
            memory_used: Some(1024.0),
            cpu_used: Some(0.5),
            io_used: Some(64.0),
            output_records: Some(10),
        })
    }

    async fn create_entity(
        &self,
        _token: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<EntityOutcome> {
        self.entities
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        Ok(EntityOutcome::Created(body.clone()))
    }

    fn endpoint(&self) -> String {
        "scripted://dremio".to_string()
    }
}

/// Hands out one shared service per cluster host.
pub struct StaticProvider {
    pub services: Vec<(String, Arc<ScriptedService>)>,
}

impl ServiceProvider for StaticProvider {
    fn service(&self, cluster: &ClusterSettings, _retry: &RetrySettings) -> Result<Arc<dyn QueryService>> {
        self.services
            .iter()
            .find(|(host, _)| *host == cluster.host)
            .map(|(_, service)| service.clone() as Arc<dyn QueryService>)
            .ok_or_else(|| BenchError::Connection(format!("no service for {}", cluster.host)))
    }
}
