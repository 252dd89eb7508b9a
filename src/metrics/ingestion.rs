//! Ingestion metrics: one JSON document per upload attempt, aggregated into a
//! dashboard by format, size and data lake.

use super::aggregator::{summarize, SummaryStats};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

pub const METRICS_VERSION: &str = "1.0";
const FILE_PREFIX: &str = "ingestion_metrics_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionMetric {
    pub timestamp: DateTime<Utc>,
    pub file_format: String,
    pub file_size_gb: u32,
    pub ingestion_time_seconds: f64,
    pub success: bool,
    pub data_lake: String,
    pub metrics_version: String,
    /// Extra fields carried through untouched.
    #[serde(flatten, default)]
    pub additional: BTreeMap<String, serde_json::Value>,
}

impl IngestionMetric {
    pub fn new(
        file_format: impl Into<String>,
        file_size_gb: u32,
        ingestion_time_seconds: f64,
        success: bool,
        data_lake: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            file_format: file_format.into(),
            file_size_gb,
            ingestion_time_seconds,
            success,
            data_lake: data_lake.into(),
            metrics_version: METRICS_VERSION.to_string(),
            additional: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.additional.insert(key.into(), value);
        self
    }
}

/// Directory of `ingestion_metrics_<timestamp>_<id>.json` files.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    dir: PathBuf,
}

impl MetricsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one metric as its own file.
    pub fn record(&self, metric: &IngestionMetric) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let id = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}{}_{}.json",
            FILE_PREFIX,
            metric.timestamp.format("%Y%m%dT%H%M%S%.6f"),
            &id[..8]
        );
        let path = self.dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(metric)?)?;
        info!(
            "Recorded metrics for {} {}GB ingestion into {}",
            metric.file_format, metric.file_size_gb, metric.data_lake
        );
        Ok(path)
    }

    /// Load every metric file; unreadable files are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<IngestionMetric>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().map_or(false, |ext| ext == "json")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map_or(false, |n| n.starts_with(FILE_PREFIX))
            })
            .collect();
        paths.sort();

        let mut metrics = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = std::fs::read_to_string(&path)
                .map_err(crate::error::BenchError::from)
                .and_then(|text| Ok(serde_json::from_str::<IngestionMetric>(&text)?));
            match parsed {
                Ok(metric) => metrics.push(metric),
                Err(e) => warn!("Skipping metrics file {}: {}", path.display(), e),
            }
        }
        Ok(metrics)
    }

    pub fn dashboard(&self) -> Result<IngestionDashboard> {
        Ok(IngestionDashboard::from_metrics(&self.load_all()?))
    }
}

/// One point of the ingestion time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub file_format: String,
    pub ingestion_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionDashboard {
    pub generated_at: DateTime<Utc>,
    pub total_ingestions: usize,
    pub successful_ingestions: usize,
    pub failed_ingestions: usize,
    pub average_ingestion_time: Option<f64>,
    pub by_format: SummaryStats,
    pub by_size: SummaryStats,
    pub by_data_lake: SummaryStats,
    /// Every ingestion in timestamp order.
    pub trend: Vec<TrendPoint>,
}

impl IngestionDashboard {
    pub fn from_metrics(metrics: &[IngestionMetric]) -> Self {
        let successful = metrics.iter().filter(|m| m.success).count();
        let average = if metrics.is_empty() {
            None
        } else {
            Some(metrics.iter().map(|m| m.ingestion_time_seconds).sum::<f64>() / metrics.len() as f64)
        };
        let mut trend: Vec<TrendPoint> = metrics
            .iter()
            .map(|m| TrendPoint {
                timestamp: m.timestamp,
                file_format: m.file_format.clone(),
                ingestion_time_seconds: m.ingestion_time_seconds,
            })
            .collect();
        trend.sort_by_key(|p| p.timestamp);

        Self {
            generated_at: Utc::now(),
            total_ingestions: metrics.len(),
            successful_ingestions: successful,
            failed_ingestions: metrics.len() - successful,
            average_ingestion_time: average,
            by_format: summarize(metrics, |m| m.file_format.clone()),
            by_size: summarize(metrics, |m| format!("{}gb", m.file_size_gb)),
            by_data_lake: summarize(metrics, |m| m.data_lake.clone()),
            trend,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::new(dir.path().join("metrics"));

        let path = store
            .record(&IngestionMetric::new("parquet", 1, 2.5, true, "hdfs_simple_auth"))
            .unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("ingestion_metrics_"));
        store
            .record(
                &IngestionMetric::new("csv", 10, 4.0, false, "hdfs_kerberized")
                    .with_field("tables", serde_json::json!(24)),
            )
            .unwrap();
        std::fs::write(store.dir().join("ingestion_metrics_broken.json"), "{").unwrap();
        std::fs::write(store.dir().join("notes.json"), "{}").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        let csv = loaded.iter().find(|m| m.file_format == "csv").unwrap();
        assert_eq!(csv.metrics_version, "1.0");
        assert_eq!(csv.additional.get("tables"), Some(&serde_json::json!(24)));
    }

    #[test]
    fn test_dashboard_counts() {
        let metrics = vec![
            IngestionMetric::new("parquet", 1, 2.0, true, "hdfs_simple_auth"),
            IngestionMetric::new("parquet", 10, 4.0, false, "hdfs_kerberized"),
            IngestionMetric::new("csv", 1, 6.0, true, "hdfs_simple_auth"),
        ];
        let dashboard = IngestionDashboard::from_metrics(&metrics);
        assert_eq!(dashboard.total_ingestions, 3);
        assert_eq!(dashboard.successful_ingestions, 2);
        assert_eq!(dashboard.failed_ingestions, 1);
        assert_eq!(dashboard.average_ingestion_time, Some(4.0));
        assert_eq!(dashboard.by_format["parquet"].mean, 3.0);
        assert_eq!(dashboard.by_size["1gb"].count, 2);
        assert_eq!(dashboard.by_data_lake["hdfs_kerberized"].success_rate, 0.0);
    }

    #[test]
    fn test_empty_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = MetricsStore::new(dir.path().join("missing")).dashboard().unwrap();
        assert_eq!(dashboard.total_ingestions, 0);
        assert_eq!(dashboard.average_ingestion_time, None);
        assert!(dashboard.trend.is_empty());
    }

    #[test]
    fn test_trend_is_time_ordered() {
        let mut late = IngestionMetric::new("orc", 1, 9.0, true, "hdfs_simple_auth");
        let mut early = IngestionMetric::new("csv", 1, 3.0, true, "hdfs_kerberized");
        late.timestamp = "2024-03-02T10:00:00Z".parse().unwrap();
        early.timestamp = "2024-03-01T10:00:00Z".parse().unwrap();

        let dashboard = IngestionDashboard::from_metrics(&[late, early]);

        let formats: Vec<&str> = dashboard.trend.iter().map(|p| p.file_format.as_str()).collect();
        assert_eq!(formats, vec!["csv", "orc"]);
        assert_eq!(dashboard.trend[1].ingestion_time_seconds, 9.0);

        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["trend"][0]["file_format"], "csv");
        assert_eq!(json["trend"][0]["timestamp"], "2024-03-01T10:00:00Z");
    }
}
