//! Grouped statistics and A-vs-B comparison.

use super::ingestion::IngestionMetric;
use super::records::BenchmarkRecord;
use crate::client::JobState;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

/// Anything with a duration and a success flag.
pub trait Observation {
    fn duration_seconds(&self) -> f64;
    fn succeeded(&self) -> bool;

    fn memory_used(&self) -> Option<f64> {
        None
    }

    fn cpu_used(&self) -> Option<f64> {
        None
    }

    fn io_used(&self) -> Option<f64> {
        None
    }
}

impl Observation for BenchmarkRecord {
    fn duration_seconds(&self) -> f64 {
        self.execution_time
    }

    fn succeeded(&self) -> bool {
        self.status == JobState::Completed
    }

    fn memory_used(&self) -> Option<f64> {
        self.memory_used
    }

    fn cpu_used(&self) -> Option<f64> {
        self.cpu_used
    }

    fn io_used(&self) -> Option<f64> {
        self.io_used
    }
}

impl Observation for IngestionMetric {
    fn duration_seconds(&self) -> f64 {
        self.ingestion_time_seconds
    }

    fn succeeded(&self) -> bool {
        self.success
    }
}

/// Mean and max of an optional resource column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceStats {
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub count: usize,
    pub success_count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; `None` with fewer than two observations.
    pub std_dev: Option<f64>,
    /// Fraction of observations that succeeded, 0.0..=1.0.
    pub success_rate: f64,
    pub memory: Option<ResourceStats>,
    pub cpu: Option<ResourceStats>,
    pub io: Option<ResourceStats>,
}

/// Group summaries keyed (and ordered) by group key.
pub type SummaryStats = BTreeMap<String, GroupSummary>;

pub fn summarize<R, F>(records: &[R], key: F) -> SummaryStats
where
    R: Observation,
    F: Fn(&R) -> String,
{
    records
        .iter()
        .into_group_map_by(|r| key(*r))
        .into_iter()
        .map(|(group, members)| {
            let summary = summarize_group(&group, &members);
            (group, summary)
        })
        .collect()
}

fn summarize_group<R: Observation>(key: &str, members: &[&R]) -> GroupSummary {
    let times: Vec<f64> = members.iter().map(|r| r.duration_seconds()).collect();
    let count = times.len();
    let success_count = members.iter().filter(|r| r.succeeded()).count();

    let mean = mean(&times).unwrap_or(0.0);
    let (min, max) = times
        .iter()
        .copied()
        .minmax()
        .into_option()
        .unwrap_or((0.0, 0.0));

    GroupSummary {
        key: key.to_string(),
        count,
        success_count,
        mean,
        min,
        max,
        std_dev: sample_std(&times),
        success_rate: if count == 0 {
            0.0
        } else {
            success_count as f64 / count as f64
        },
        memory: resource(members.iter().filter_map(|r| r.memory_used())),
        cpu: resource(members.iter().filter_map(|r| r.cpu_used())),
        io: resource(members.iter().filter_map(|r| r.io_used())),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn resource(values: impl Iterator<Item = f64>) -> Option<ResourceStats> {
    let values: Vec<f64> = values.collect();
    let mean = mean(&values)?;
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    Some(ResourceStats { mean, max })
}

/// Per-key difference between two summaries; `b - a`, relative to `a`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub key: String,
    pub a_mean: Option<f64>,
    pub b_mean: Option<f64>,
    pub abs_delta: Option<f64>,
    /// `None` when either side is missing or the baseline mean is zero.
    pub pct_delta: Option<f64>,
    pub a_memory: Option<f64>,
    pub b_memory: Option<f64>,
    pub memory_pct_delta: Option<f64>,
    pub a_success_rate: Option<f64>,
    pub b_success_rate: Option<f64>,
}

/// Compare every key present in either summary.
pub fn compare(a: &SummaryStats, b: &SummaryStats) -> Vec<ComparisonRow> {
    a.keys()
        .chain(b.keys())
        .unique()
        .sorted()
        .map(|key| {
            let left = a.get(key);
            let right = b.get(key);
            let a_mean = left.map(|s| s.mean);
            let b_mean = right.map(|s| s.mean);
            let a_memory = left.and_then(|s| s.memory.map(|m| m.mean));
            let b_memory = right.and_then(|s| s.memory.map(|m| m.mean));

            ComparisonRow {
                key: key.clone(),
                a_mean,
                b_mean,
                abs_delta: a_mean.zip(b_mean).map(|(x, y)| y - x),
                pct_delta: pct_delta(a_mean, b_mean),
                a_memory,
                b_memory,
                memory_pct_delta: pct_delta(a_memory, b_memory),
                a_success_rate: left.map(|s| s.success_rate),
                b_success_rate: right.map(|s| s.success_rate),
            }
        })
        .collect()
}

fn pct_delta(baseline: Option<f64>, other: Option<f64>) -> Option<f64> {
    match (baseline, other) {
        (Some(a), Some(b)) if a != 0.0 => Some((b - a) / a * 100.0),
        _ => None,
    }
}

/// Render an optional percentage, `N/A` when undefined.
pub fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Obs(&'static str, f64, bool);

    impl Observation for Obs {
        fn duration_seconds(&self) -> f64 {
            self.1
        }
        fn succeeded(&self) -> bool {
            self.2
        }
    }

    #[test]
    fn test_summary_statistics() {
        let records = vec![
            Obs("q1", 1.0, true),
            Obs("q1", 3.0, false),
            Obs("q2", 2.0, true),
        ];
        let stats = summarize(&records, |r| r.0.to_string());
        let q1 = &stats["q1"];
        assert_eq!(q1.count, 2);
        assert_eq!(q1.mean, 2.0);
        assert_eq!(q1.min, 1.0);
        assert_eq!(q1.max, 3.0);
        assert!((q1.std_dev.unwrap() - 2f64.sqrt()).abs() < 1e-9);
        assert_eq!(q1.success_rate, 0.5);
        assert!(q1.memory.is_none());
        assert_eq!(stats["q2"].std_dev, None);
    }

    #[test]
    fn test_compare_reports_na_for_zero_baseline() {
        let records = vec![Obs("fast", 0.0, true), Obs("slow", 2.0, true)];
        let stats = summarize(&records, |r| r.0.to_string());
        let rows = compare(&stats, &stats);
        let fast = rows.iter().find(|r| r.key == "fast").unwrap();
        assert_eq!(fast.abs_delta, Some(0.0));
        assert_eq!(fast.pct_delta, None);
        assert_eq!(format_pct(fast.pct_delta), "N/A");
        let slow = rows.iter().find(|r| r.key == "slow").unwrap();
        assert_eq!(slow.pct_delta, Some(0.0));
    }

    #[test]
    fn test_compare_one_sided_key() {
        let a = summarize(&[Obs("q1", 1.0, true)], |r| r.0.to_string());
        let b = summarize(&[Obs("q1", 1.5, true), Obs("q9", 1.0, true)], |r| r.0.to_string());
        let rows = compare(&a, &b);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pct_delta, Some(50.0));
        assert_eq!(rows[1].key, "q9");
        assert_eq!(rows[1].a_mean, None);
        assert_eq!(rows[1].abs_delta, None);
    }
}
