//! Fixed names shared across stages: TPC-DS tables, formats, directory layout
//! and cluster defaults.

pub const TPCDS_TABLES: [&str; 24] = [
    "call_center",
    "catalog_page",
    "catalog_returns",
    "catalog_sales",
    "customer",
    "customer_address",
    "customer_demographics",
    "date_dim",
    "household_demographics",
    "income_band",
    "inventory",
    "item",
    "promotion",
    "reason",
    "ship_mode",
    "store",
    "store_returns",
    "store_sales",
    "time_dim",
    "warehouse",
    "web_page",
    "web_returns",
    "web_sales",
    "web_site",
];

pub const FILE_FORMATS: [&str; 5] = ["csv", "json", "pipe", "orc", "parquet"];

pub const DEFAULT_SCALE_FACTORS: [u32; 2] = [1, 10];

pub const DEFAULT_CONFIG_PATH: &str = "config/default_config.yml";
pub const DEFAULT_BASE_DIR: &str = "./pipeline";
pub const DEFAULT_HDFS_TARGET_DIR: &str = "/benchmark/tpcds";
pub const DEFAULT_LOG_FILE: &str = "benchmark_pipeline.log";

pub const DATA_DIR: &str = "data";
pub const FORMATTED_DATA_DIR: &str = "data/formatted";
pub const LOGS_DIR: &str = "logs";
pub const RESULTS_DIR: &str = "results";
pub const REPORTS_DIR: &str = "reports";
pub const METRICS_DIR: &str = "metrics";

pub const DEFAULT_DREMIO_PORT: u16 = 9047;
pub const DEFAULT_DREMIO_USER: &str = "admin";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_DDL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

pub const CLUSTER_A: &str = "dremio_a";
pub const CLUSTER_B: &str = "dremio_b";

pub const RESULTS_A_FILE: &str = "dremio_a_results.csv";
pub const RESULTS_B_FILE: &str = "dremio_b_results.csv";
pub const RESULTS_CROSS_FILE: &str = "cross_cluster_results.csv";

/// Environment prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DREMIO_BENCH";
