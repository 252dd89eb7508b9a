//! Metrics/Results Aggregator
//!
//! Benchmark records, ingestion metrics and the grouping statistics the
//! report stage renders.

pub mod aggregator;
pub mod ingestion;
pub mod records;

pub use aggregator::{compare, summarize, ComparisonRow, GroupSummary, Observation, SummaryStats};
pub use ingestion::{IngestionDashboard, IngestionMetric, MetricsStore};
pub use records::BenchmarkRecord;
