//! Benchmark result rows and their CSV persistence.

use crate::client::{JobState, JobStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One query execution (one per query per iteration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub query_name: String,
    pub execution_time: f64,
    pub job_id: String,
    pub status: JobState,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub iteration: u32,
    pub error: Option<String>,
    pub memory_used: Option<f64>,
    pub cpu_used: Option<f64>,
    pub io_used: Option<f64>,
    pub records_processed: Option<u64>,
}

impl BenchmarkRecord {
    /// Build from a finished job.
    pub fn from_status(
        query_name: &str,
        query: &str,
        iteration: u32,
        execution_time: f64,
        status: &JobStatus,
    ) -> Self {
        let profile = status.profile.as_ref();
        Self {
            query_name: query_name.to_string(),
            execution_time,
            job_id: status.job_id.clone(),
            status: status.state,
            query: query.to_string(),
            timestamp: Utc::now(),
            iteration,
            error: status.error_message.clone(),
            memory_used: profile.and_then(|p| p.memory_used),
            cpu_used: profile.and_then(|p| p.cpu_used),
            io_used: profile.and_then(|p| p.io_used),
            records_processed: profile.and_then(|p| p.output_records).or(status.row_count),
        }
    }

    /// A query that never got a job id.
    pub fn submission_failed(
        query_name: &str,
        query: &str,
        iteration: u32,
        execution_time: f64,
        error: &str,
    ) -> Self {
        Self {
            query_name: query_name.to_string(),
            execution_time,
            job_id: String::new(),
            status: JobState::Failed,
            query: query.to_string(),
            timestamp: Utc::now(),
            iteration,
            error: Some(error.to_string()),
            memory_used: None,
            cpu_used: None,
            io_used: None,
            records_processed: None,
        }
    }
}

/// Write records with a header row, replacing any existing file.
pub fn write_records(path: &Path, records: &[BenchmarkRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<BenchmarkRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
