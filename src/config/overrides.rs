//! Environment overrides.
//!
//! Variable name = `DREMIO_BENCH_` + dotted key with `.` replaced by `_`,
//! uppercased. Candidates are every leaf already in the document plus
//! [`KNOWN_KEYS`], so a key can be supplied purely from the environment.

use super::Config;
use crate::constants::ENV_PREFIX;
use serde_yaml::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Keys that may be set from the environment even when the file omits them.
/// The flag marks list-valued keys.
pub const KNOWN_KEYS: &[(&str, bool)] = &[
    ("clusters.dremio_a.host", false),
    ("clusters.dremio_a.port", false),
    ("clusters.dremio_a.username", false),
    ("clusters.dremio_a.password", false),
    ("clusters.dremio_a.ssl", false),
    ("clusters.dremio_b.host", false),
    ("clusters.dremio_b.port", false),
    ("clusters.dremio_b.username", false),
    ("clusters.dremio_b.password", false),
    ("clusters.dremio_b.ssl", false),
    ("client.max_retries", false),
    ("client.retry_delay", false),
    ("client.request_timeout", false),
    ("hdfs.client", false),
    ("hdfs.simple_auth.hadoop_bin", false),
    ("hdfs.simple_auth.hadoop_conf", false),
    ("hdfs.simple_auth.user", false),
    ("hdfs.simple_auth.webhdfs_url", false),
    ("hdfs.kerberized.hadoop_bin", false),
    ("hdfs.kerberized.hadoop_conf", false),
    ("hdfs.kerberized.keytab", false),
    ("hdfs.kerberized.principal", false),
    ("hdfs.kerberized.webhdfs_url", false),
    ("pipeline.base_dir", false),
    ("pipeline.scale_factors", true),
    ("pipeline.formats", true),
    ("pipeline.hdfs_target_dir", false),
    ("pipeline.query_dir", false),
    ("pipeline.query_timeout", false),
    ("pipeline.ddl_timeout", false),
    ("pipeline.poll_interval", false),
    ("pipeline.iterations", false),
    ("pipeline.concurrency", false),
    ("pipeline.stop_on_error", false),
    ("pipeline.execute_ddl", false),
    ("data_generation.dsdgen_path", false),
    ("data_generation.converter_path", false),
    ("cross_cluster.user", false),
    ("cross_cluster.password", false),
    ("reports.title", false),
    ("reports.include_charts", false),
];

/// `clusters.dremio_a.host` -> `DREMIO_BENCH_CLUSTERS_DREMIO_A_HOST`
pub fn env_var_name(key: &str) -> String {
    format!("{}_{}", ENV_PREFIX, key.replace('.', "_").to_ascii_uppercase())
}

pub(super) fn apply<F>(config: &mut Config, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let existing = config.leaf_keys();
    let mut candidates: BTreeSet<(String, bool)> = KNOWN_KEYS
        .iter()
        .map(|(key, is_list)| (key.to_string(), *is_list))
        .collect();
    for key in existing {
        let is_list = matches!(config.get(&key), Some(Value::Sequence(_)))
            || KNOWN_KEYS.iter().any(|(k, list)| *k == key && *list);
        if !candidates.iter().any(|(k, _)| *k == key) {
            candidates.insert((key, is_list));
        }
    }

    let mut applied = 0;
    for (key, is_list) in candidates {
        let name = env_var_name(&key);
        if let Some(raw) = lookup(&name) {
            let value = if is_list {
                parse_list(&raw)
            } else {
                parse_scalar(&raw)
            };
            debug!("Override {} from {}", key, name);
            config.set(&key, value);
            applied += 1;
        }
    }
    applied
}

/// Parse as a YAML scalar, keeping the raw text when YAML would turn it into
/// something else (a mapping, a comment, an empty document).
pub fn parse_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(raw.to_string());
    }
    match serde_yaml::from_str::<Value>(trimmed) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        Ok(Value::Null) if matches!(trimmed, "null" | "~" | "Null" | "NULL") => Value::Null,
        _ => Value::String(raw.to_string()),
    }
}

/// Accepts `[1, 10]`, `1,10` or `1 10`.
pub fn parse_list(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(v @ Value::Sequence(_)) = serde_yaml::from_str::<Value>(trimmed) {
            return v;
        }
    }
    let items = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(parse_scalar)
        .collect();
    Value::Sequence(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            env_var_name("clusters.dremio_a.host"),
            "DREMIO_BENCH_CLUSTERS_DREMIO_A_HOST"
        );
        assert_eq!(env_var_name("pipeline.query_dir"), "DREMIO_BENCH_PIPELINE_QUERY_DIR");
    }

    #[test]
    fn test_scalar_parsing() {
        assert_eq!(parse_scalar("9047"), Value::Number(9047.into()));
        assert_eq!(parse_scalar("false"), Value::Bool(false));
        assert_eq!(parse_scalar("host.example.com"), Value::String("host.example.com".into()));
        assert_eq!(parse_scalar("#secret"), Value::String("#secret".into()));
        assert_eq!(parse_scalar("a: b"), Value::String("a: b".into()));
    }

    #[test]
    fn test_list_parsing() {
        let expected = Value::Sequence(vec![Value::Number(1.into()), Value::Number(10.into())]);
        assert_eq!(parse_list("1,10"), expected);
        assert_eq!(parse_list("1 10"), expected);
        assert_eq!(parse_list("[1, 10]"), expected);
    }

    #[test]
    fn test_override_unknown_leaf_in_file() {
        let mut config = Config::from_yaml_str("custom:\n  flag: 1\n").unwrap();
        let env: HashMap<String, String> =
            [("DREMIO_BENCH_CUSTOM_FLAG".to_string(), "2".to_string())].into();
        let applied = config.apply_overrides_from(|k| env.get(k).cloned());
        assert_eq!(applied, 1);
        assert_eq!(config.get_u64("custom.flag"), Some(2));
    }
}
