//! Configuration Resolver
//!
//! Loads the YAML pipeline document, applies `DREMIO_BENCH_*` environment
//! overrides and exposes dotted-key accessors plus typed views in [`settings`].

pub mod overrides;
pub mod settings;
pub mod validation;

use crate::error::Result;
use crate::pipeline::PipelineStep;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::{error, info, warn};

pub use overrides::{env_var_name, KNOWN_KEYS};
pub use settings::{
    ClusterSettings, CrossClusterSettings, DataGenSettings, HdfsSettings, PipelineSettings,
    RemoteFsKind, ReportSettings, RetrySettings,
};

/// Resolved pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self::empty()
    }
}

impl Config {
    pub fn empty() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    /// Wrap a parsed document. Anything other than a mapping yields an empty config.
    pub fn new(root: Value) -> Self {
        match root {
            Value::Mapping(_) => Self { root },
            _ => Self::empty(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(text)?;
        Ok(Self::new(root))
    }

    /// Load `path`, then `.env`, then apply process environment overrides.
    ///
    /// A missing or unreadable file is not an error: the pipeline falls back to
    /// defaults and whatever the environment supplies.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::load_file(path);
        dotenv::dotenv().ok();
        config.apply_env_overrides();
        config
    }

    /// Load `path` without touching the environment.
    pub fn load_file(path: &Path) -> Self {
        if !path.exists() {
            warn!("Configuration file not found: {}", path.display());
            return Self::empty();
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to read configuration from {}: {}", path.display(), e);
                return Self::empty();
            }
        };

        match Self::from_yaml_str(&text) {
            Ok(config) if config.is_empty() => {
                warn!("Empty configuration file: {}", path.display());
                config
            }
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                error!("Failed to load configuration from {}: {}", path.display(), e);
                Self::empty()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_mapping().map_or(true, |m| m.is_empty())
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Resolve a dotted key. `None` if any segment is missing or not a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in key.split('.') {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Resolve a dotted key into `T`, returning `default` when absent or mistyped.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => serde_yaml::from_value(value.clone()).unwrap_or_else(|e| {
                warn!("Ignoring invalid value for {}: {}", key, e);
                default
            }),
        }
    }

    /// Scalar as text; numbers and booleans are rendered.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_u64().map(|v| v != 0),
            _ => None,
        }
    }

    /// A sequence of scalars rendered as text. A single scalar becomes a one-item list.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Value::Sequence(items) => Some(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        Value::Bool(b) => Some(b.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Null => None,
            _ => self.get_str(key).map(|s| vec![s]),
        }
    }

    /// True when the key resolves to a non-null, non-blank value.
    pub fn has(&self, key: &str) -> bool {
        match self.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Set a dotted key, creating intermediate mappings as needed.
    pub fn set(&mut self, key: &str, value: Value) {
        let segments: Vec<&str> = key.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(parts) => parts,
            None => return,
        };

        let mut current = &mut self.root;
        for segment in parents {
            if !current.is_mapping() {
                *current = Value::Mapping(Mapping::new());
            }
            let map = match current.as_mapping_mut() {
                Some(map) => map,
                None => return,
            };
            let entry = map
                .entry(Value::String(segment.to_string()))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            current = entry;
        }

        if let Some(map) = current.as_mapping_mut() {
            map.insert(Value::String(last.to_string()), value);
        }
    }

    /// Dotted paths of every leaf in the document. Sequences count as leaves.
    pub fn leaf_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        collect_leaves(&self.root, String::new(), &mut keys);
        keys
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> usize {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> usize
    where
        F: Fn(&str) -> Option<String>,
    {
        overrides::apply(self, lookup)
    }

    /// Check the required keys for `step`, reporting every missing key.
    pub fn validate(&self, step: PipelineStep) -> (bool, Vec<String>) {
        validation::validate(self, step)
    }
}

fn collect_leaves(value: &Value, prefix: String, out: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let segment = match key {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => continue,
                };
                let path = if prefix.is_empty() {
                    segment
                } else {
                    format!("{}.{}", prefix, segment)
                };
                collect_leaves(child, path, out);
            }
        }
        _ if !prefix.is_empty() => out.push(prefix),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
clusters:
  dremio_a:
    host: a.example.com
    port: 9047
    ssl: false
pipeline:
  scale_factors: [1, 10]
  formats: [csv, parquet]
"#;

    #[test]
    fn test_dotted_get() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.get_str("clusters.dremio_a.host").as_deref(), Some("a.example.com"));
        assert_eq!(config.get_u64("clusters.dremio_a.port"), Some(9047));
        assert_eq!(config.get_bool("clusters.dremio_a.ssl"), Some(false));
        assert!(config.get("clusters.dremio_a.host.extra").is_none());
        assert!(config.get("clusters.dremio_c.host").is_none());
        assert_eq!(config.get_or("pipeline.iterations", 3u32), 3);
        assert_eq!(config.get_or::<Vec<u32>>("pipeline.scale_factors", vec![]), vec![1, 10]);
    }

    #[test]
    fn test_set_creates_parents() {
        let mut config = Config::empty();
        config.set("hdfs.kerberized.principal", Value::String("hdfs@REALM".into()));
        assert_eq!(config.get_str("hdfs.kerberized.principal").as_deref(), Some("hdfs@REALM"));

        // A scalar in the way is replaced by a mapping
        config.set("hdfs.kerberized.principal.inner", Value::Bool(true));
        assert_eq!(config.get_bool("hdfs.kerberized.principal.inner"), Some(true));
    }

    #[test]
    fn test_leaf_keys() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let keys = config.leaf_keys();
        assert!(keys.contains(&"clusters.dremio_a.port".to_string()));
        assert!(keys.contains(&"pipeline.formats".to_string()));
        assert!(!keys.contains(&"clusters".to_string()));
    }

    #[test]
    fn test_has_ignores_blank() {
        let config = Config::from_yaml_str("a:\n  b: ''\n  c: ~\n  d: x\n").unwrap();
        assert!(!config.has("a.b"));
        assert!(!config.has("a.c"));
        assert!(config.has("a.d"));
    }

    #[test]
    fn test_non_mapping_document_is_empty() {
        let config = Config::from_yaml_str("- 1\n- 2\n").unwrap();
        assert!(config.is_empty());
    }
}
