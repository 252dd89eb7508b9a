mod common;

use async_trait::async_trait;
use common::{ScriptedService, StaticProvider, StatusReply};
use dremio_bench::client::{Credentials, JobClient, JobState};
use dremio_bench::command::{CommandOutcome, CommandRunner, CommandSpec, SystemCommandRunner};
use dremio_bench::config::{ClusterSettings, Config, CrossClusterSettings, HdfsSettings};
use dremio_bench::metrics::records::read_records;
use dremio_bench::pipeline::{Orchestrator, PipelineStep};
use dremio_bench::stages::benchmark::{run_queries, BenchmarkOptions, QueryFile};
use dremio_bench::stages::cross::provision;
use dremio_bench::stages::ddl::execute_schemas;
use dremio_bench::stages::hdfs::{ensure_ticket, RemoteFs};
use dremio_bench::stages::upload::upload_unit;
use dremio_bench::stages::StageRunner;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);
const INTERVAL: Duration = Duration::from_millis(1);

/// Remote filesystem that records calls and fails `put` for one table.
#[derive(Default)]
struct RecordingFs {
    calls: Mutex<Vec<String>>,
    fail_put_for: Option<&'static str>,
}

#[async_trait]
impl RemoteFs for RecordingFs {
    async fn mkdirs(&self, remote_dir: &str) -> CommandOutcome {
        self.calls.lock().unwrap().push(format!("mkdir {}", remote_dir));
        CommandOutcome::ok("")
    }

    async fn put(&self, local: &Path, remote_dir: &str) -> CommandOutcome {
        let table = local.file_name().unwrap().to_string_lossy().into_owned();
        self.calls
            .lock()
            .unwrap()
            .push(format!("put {} {}", table, remote_dir));
        if self.fail_put_for == Some(table.as_str()) {
            CommandOutcome::failed("put: Permission denied")
        } else {
            CommandOutcome::ok("")
        }
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Command runner scripted by program name.
struct ScriptedRunner {
    klist: CommandOutcome,
    programs: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec, _description: &str) -> CommandOutcome {
        let program = match spec {
            CommandSpec::Process { program, .. } => program.clone(),
            other => other.display(),
        };
        self.programs.lock().unwrap().push(program.clone());
        if program == "klist" {
            self.klist.clone()
        } else {
            CommandOutcome::ok("")
        }
    }
}

/// Converter double: records each invocation and fails for one table/format pair.
struct ConversionRunner {
    fail_table: &'static str,
    fail_format: &'static str,
    invocations: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl CommandRunner for ConversionRunner {
    async fn run(&self, spec: &CommandSpec, _description: &str) -> CommandOutcome {
        let args = match spec {
            CommandSpec::Process { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        self.invocations.lock().unwrap().push(args.clone());
        let input_is_failing_table = args
            .iter()
            .any(|a| a.ends_with(&format!("{}.dat", self.fail_table)));
        if input_is_failing_table && args.iter().any(|a| a == self.fail_format) {
            CommandOutcome::failed("converter: unsupported column type")
        } else {
            CommandOutcome::ok("")
        }
    }
}

fn conversion_config(base: &Path) -> Config {
    let mut config = Config::from_yaml_str(
        "data_generation:\n  converter_path: /opt/tpcds/convert\n  tables: [customer, item]\npipeline:\n  scale_factors: [1]\n  formats: [csv, orc]\n",
    )
    .unwrap();
    config.set("pipeline.base_dir", serde_yaml::Value::String(base.display().to_string()));
    config
}

fn kerberized() -> HdfsSettings {
    HdfsSettings {
        name: "kerberized".into(),
        hadoop_bin: "hadoop".into(),
        hadoop_conf: "/etc/hadoop/kerberized".into(),
        user: "hdfs".into(),
        keytab: Some("/etc/bench.keytab".into()),
        principal: Some("bench@EXAMPLE.COM".into()),
        webhdfs_url: None,
    }
}

fn formatted_tree(root: &Path, tables: &[&str]) {
    for table in tables {
        let dir = root.join("1gb").join("parquet").join(table);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("part-0.parquet"), b"PAR1").unwrap();
    }
}

#[tokio::test]
async fn test_upload_unit_puts_every_existing_table() {
    let dir = tempfile::tempdir().unwrap();
    formatted_tree(dir.path(), &["customer", "item"]);
    let fs = RecordingFs::default();
    let tables = vec!["customer".to_string(), "item".to_string(), "store".to_string()];

    let unit = upload_unit(&fs, dir.path(), "/benchmark/tpcds/", 1, "parquet", &tables).await;

    assert!(unit.success);
    assert_eq!(unit.tables_uploaded, 2);
    assert_eq!(
        *fs.calls.lock().unwrap(),
        vec![
            "mkdir /benchmark/tpcds/1gb/parquet".to_string(),
            "put customer /benchmark/tpcds/1gb/parquet".to_string(),
            "put item /benchmark/tpcds/1gb/parquet".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_upload_unit_stops_at_first_failed_table() {
    let dir = tempfile::tempdir().unwrap();
    formatted_tree(dir.path(), &["customer", "item"]);
    let fs = RecordingFs {
        fail_put_for: Some("customer"),
        ..Default::default()
    };
    let tables = vec!["customer".to_string(), "item".to_string()];

    let unit = upload_unit(&fs, dir.path(), "/benchmark/tpcds", 1, "parquet", &tables).await;

    assert!(!unit.success);
    assert_eq!(unit.tables_uploaded, 0);
    assert_eq!(fs.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_kinit_skipped_with_valid_ticket() {
    let runner = ScriptedRunner {
        klist: CommandOutcome::ok(""),
        programs: Mutex::new(Vec::new()),
    };

    assert!(ensure_ticket(&runner, &kerberized()).await);
    assert_eq!(*runner.programs.lock().unwrap(), vec!["klist".to_string()]);
}

#[tokio::test]
async fn test_kinit_runs_without_ticket() {
    let mut absent = CommandOutcome::failed("");
    absent.exit_code = Some(1);
    let runner = ScriptedRunner {
        klist: absent,
        programs: Mutex::new(Vec::new()),
    };

    assert!(ensure_ticket(&runner, &kerberized()).await);
    assert_eq!(
        *runner.programs.lock().unwrap(),
        vec!["klist".to_string(), "kinit".to_string()]
    );
}

#[tokio::test]
async fn test_kinit_runs_when_klist_unavailable() {
    let runner = ScriptedRunner {
        klist: CommandOutcome::failed("No such file or directory"),
        programs: Mutex::new(Vec::new()),
    };

    assert!(ensure_ticket(&runner, &kerberized()).await);
    assert_eq!(runner.programs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_run_queries_records_every_iteration() {
    let service = Arc::new(ScriptedService::completing());
    let client = Arc::new(
        JobClient::connect(service.clone(), &Credentials::new("admin", "secret"))
            .await
            .unwrap(),
    );
    let queries = vec![
        QueryFile { name: "q2".into(), sql: "SELECT 2".into() },
        QueryFile { name: "q1".into(), sql: "SELECT 1".into() },
    ];
    let options = BenchmarkOptions {
        iterations: 2,
        concurrency: 2,
        timeout: TIMEOUT,
        interval: INTERVAL,
    };

    let records = run_queries(client, &queries, options).await;

    assert_eq!(records.len(), 4);
    let order: Vec<(u32, &str)> = records
        .iter()
        .map(|r| (r.iteration, r.query_name.as_str()))
        .collect();
    assert_eq!(order, vec![(1, "q1"), (1, "q2"), (2, "q1"), (2, "q2")]);
    assert!(records.iter().all(|r| r.status == JobState::Completed));
    assert!(records.iter().all(|r| r.memory_used == Some(1024.0)));
    assert_eq!(service.submitted.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_failed_query_still_yields_record() {
    let mut service = ScriptedService::completing();
    service.submit_error = Some("PARSE ERROR");
    let client = Arc::new(
        JobClient::connect(Arc::new(service), &Credentials::new("admin", "secret"))
            .await
            .unwrap(),
    );
    let queries = vec![QueryFile { name: "q1".into(), sql: "SELEC 1".into() }];
    let options = BenchmarkOptions {
        iterations: 1,
        concurrency: 1,
        timeout: TIMEOUT,
        interval: INTERVAL,
    };

    let records = run_queries(client, &queries, options).await;

    assert_eq!(records.len(), 1);
    assert_ne!(records[0].status, JobState::Completed);
    assert!(records[0].error.as_deref().unwrap_or_default().contains("PARSE ERROR"));
}

#[tokio::test]
async fn test_ddl_schema_stops_at_first_failed_statement() {
    let service = Arc::new(ScriptedService::new(
        vec![
            StatusReply::State("COMPLETED"),
            StatusReply::Failed("FAILED", "path not found"),
        ],
        "COMPLETED",
    ));
    let client = JobClient::connect(service.clone(), &Credentials::new("admin", "secret"))
        .await
        .unwrap();
    let schemas = vec![
        (
            "tpcds_1gb_parquet".to_string(),
            vec!["CREATE SCHEMA a".to_string(), "CREATE TABLE b".to_string(), "CREATE TABLE c".to_string()],
        ),
        ("tpcds_1gb_orc".to_string(), vec!["CREATE SCHEMA d".to_string()]),
    ];

    let ok = execute_schemas(&client, &schemas, TIMEOUT, INTERVAL).await;

    assert!(!ok);
    assert_eq!(
        *service.submitted.lock().unwrap(),
        vec!["CREATE SCHEMA a", "CREATE TABLE b", "CREATE SCHEMA d"]
    );
}

#[tokio::test]
async fn test_cross_provisioning_creates_user_source_and_vds() {
    let service = Arc::new(ScriptedService::completing());
    let client = JobClient::connect(service.clone(), &Credentials::new("admin", "secret"))
        .await
        .unwrap();
    let config = Config::from_yaml_str(
        "clusters:\n  dremio_b:\n    host: b.example.com\n    port: 9047\n    ssl: false\ncross_cluster:\n  password: secret\n",
    )
    .unwrap();
    let peer = ClusterSettings::from_config(&config, "dremio_b");
    let settings = CrossClusterSettings::from_config(&config);

    assert!(provision(&client, &peer, &settings, TIMEOUT, INTERVAL).await);

    let entities = service.entities.lock().unwrap();
    let paths: Vec<&str> = entities.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["/user", "/catalog"]);
    assert_eq!(entities[1].1["name"], "DremioB");
    assert_eq!(entities[1].1["config"]["hostname"], "b.example.com");
    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].contains("DremioB"));
}

#[tokio::test]
async fn test_benchmark_then_report_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("run");
    let queries = dir.path().join("queries");
    std::fs::create_dir_all(&queries).unwrap();
    std::fs::write(queries.join("q1.sql"), "SELECT 1").unwrap();
    std::fs::write(queries.join("q2.sql"), "SELECT 2").unwrap();

    let mut config = Config::from_yaml_str(
        "clusters:\n  dremio_a: { host: a.example.com }\n  dremio_b: { host: b.example.com }\nreports:\n  title: Nightly run\n",
    )
    .unwrap();
    config.set("pipeline.base_dir", serde_yaml::Value::String(base.display().to_string()));
    config.set("pipeline.query_dir", serde_yaml::Value::String(queries.display().to_string()));
    config.set("pipeline.poll_interval", serde_yaml::Value::Number(0u64.into()));

    let a = Arc::new(ScriptedService::completing());
    let b = Arc::new(ScriptedService::completing());
    let provider = StaticProvider {
        services: vec![
            ("a.example.com".to_string(), a.clone()),
            ("b.example.com".to_string(), b.clone()),
        ],
    };
    let runner = StageRunner::new(Arc::new(SystemCommandRunner::new()), Box::new(provider));
    let orchestrator = Orchestrator::new(config, runner);

    let summary = orchestrator
        .run_with_summary(&[PipelineStep::Report, PipelineStep::Benchmark])
        .await;

    assert!(summary.success(), "{:?}", summary.results());
    assert_eq!(a.submitted.lock().unwrap().len(), 2);
    assert_eq!(b.submitted.lock().unwrap().len(), 2);

    let results = read_records(&base.join("results").join("dremio_a_results.csv")).unwrap();
    assert_eq!(results.len(), 2);
    assert!(!base.join("results").join("cross_cluster_results.csv").exists());

    let reports = base.join("reports");
    for file in ["summary_a.csv", "summary_b.csv", "comparison.csv", "dashboard.json", "report.html"] {
        assert!(reports.join(file).exists(), "missing {}", file);
    }
    assert!(!reports.join("summary_cross.csv").exists());
    let html = std::fs::read_to_string(reports.join("report.html")).unwrap();
    assert!(html.contains("Nightly run"));
    assert!(html.contains("Cluster Comparison"));
}

#[tokio::test]
async fn test_report_without_results_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::empty();
    config.set(
        "pipeline.base_dir",
        serde_yaml::Value::String(dir.path().display().to_string()),
    );
    let orchestrator = Orchestrator::new(config, StageRunner::default());

    assert!(!orchestrator.run(&[PipelineStep::Report]).await);
}

#[tokio::test]
async fn test_convert_attempts_every_pair_and_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("data").join("1gb");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("customer.dat"), "1|Alice|\n").unwrap();
    std::fs::write(raw.join("item.dat"), "1|widget|\n").unwrap();

    let runner = Arc::new(ConversionRunner {
        fail_table: "customer",
        fail_format: "orc",
        invocations: Mutex::new(Vec::new()),
    });
    let stages = StageRunner::new(runner.clone(), Box::new(StaticProvider { services: vec![] }));
    let orchestrator = Orchestrator::new(conversion_config(dir.path()), stages);

    let summary = orchestrator.run_with_summary(&[PipelineStep::Convert]).await;

    assert_eq!(runner.invocations.lock().unwrap().len(), 4);
    assert!(!summary.success());
    let result = &summary.results()[0];
    assert_eq!(result.step, PipelineStep::Convert);
    let detail = result.error_detail.as_deref().unwrap_or_default();
    assert!(detail.contains("1gb/orc/customer"), "{}", detail);
    assert!(!detail.contains("item"), "{}", detail);
}

#[tokio::test]
async fn test_convert_without_input_data_fails() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ConversionRunner {
        fail_table: "customer",
        fail_format: "orc",
        invocations: Mutex::new(Vec::new()),
    });
    let stages = StageRunner::new(runner.clone(), Box::new(StaticProvider { services: vec![] }));
    let orchestrator = Orchestrator::new(conversion_config(dir.path()), stages);

    let summary = orchestrator.run_with_summary(&[PipelineStep::Convert]).await;

    assert!(runner.invocations.lock().unwrap().is_empty());
    assert!(!summary.success());
    let detail = summary.results()[0].error_detail.clone().unwrap_or_default();
    assert!(detail.contains("No input data found"), "{}", detail);
}

#[tokio::test]
async fn test_query_time_excludes_profile_fetch() {
    let mut scripted = ScriptedService::completing();
    scripted.profile_delay = Duration::from_millis(800);
    let service = Arc::new(scripted);
    let client = Arc::new(
        JobClient::connect(service.clone(), &Credentials::new("admin", "secret"))
            .await
            .unwrap(),
    );
    let queries = vec![QueryFile { name: "q1".into(), sql: "SELECT 1".into() }];
    let options = BenchmarkOptions {
        iterations: 1,
        concurrency: 1,
        timeout: TIMEOUT,
        interval: INTERVAL,
    };

    let records = run_queries(client, &queries, options).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, JobState::Completed);
    assert_eq!(service.profile_calls(), 1);
    assert!(records[0].execution_time < 0.5, "{}", records[0].execution_time);
}
