//! Per-step required configuration.

use super::Config;
use crate::pipeline::PipelineStep;
use tracing::error;

/// Keys that must be present (and non-blank) before `step` may run.
pub fn required_keys(step: PipelineStep) -> &'static [&'static str] {
    match step {
        PipelineStep::Data => &["data_generation.dsdgen_path"],
        PipelineStep::Convert => &["data_generation.converter_path"],
        PipelineStep::Upload => &[
            "hdfs.simple_auth.hadoop_conf",
            "hdfs.kerberized.hadoop_conf",
            "hdfs.kerberized.keytab",
            "hdfs.kerberized.principal",
        ],
        PipelineStep::Ddl => &["clusters.dremio_a.host", "clusters.dremio_b.host"],
        PipelineStep::Cross => &[
            "clusters.dremio_a.host",
            "clusters.dremio_b.host",
            "cross_cluster.password",
        ],
        PipelineStep::Benchmark => &[
            "clusters.dremio_a.host",
            "clusters.dremio_b.host",
            "pipeline.query_dir",
        ],
        PipelineStep::Report => &[],
    }
}

/// Returns every violation for `step`, not just the first.
pub fn validate(config: &Config, step: PipelineStep) -> (bool, Vec<String>) {
    let errors: Vec<String> = required_keys(step)
        .iter()
        .filter(|key| !config.has(key))
        .map(|key| format!("{} is required for {} step", key, step))
        .collect();

    for message in &errors {
        error!("{}", message);
    }

    (errors.is_empty(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_needs_nothing() {
        let (ok, errors) = validate(&Config::empty(), PipelineStep::Report);
        assert!(ok);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_all_missing_keys_reported() {
        let (ok, errors) = validate(&Config::empty(), PipelineStep::Upload);
        assert!(!ok);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&"hdfs.kerberized.keytab is required for upload step".to_string()));
    }

    #[test]
    fn test_every_step_with_keys_fails_on_empty_config() {
        for step in PipelineStep::ALL {
            let (ok, errors) = validate(&Config::empty(), step);
            assert_eq!(ok, required_keys(step).is_empty());
            assert_eq!(errors.len(), required_keys(step).len());
        }
    }
}
