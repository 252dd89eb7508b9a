//! `report` step: summary tables, A-vs-B comparison, ingestion dashboard and
//! a self-contained HTML report.

use super::StageContext;
use crate::config::ReportSettings;
use crate::constants::*;
use crate::error::Result;
use crate::metrics::aggregator::{format_pct, ResourceStats};
use crate::metrics::records::read_records;
use crate::metrics::{
    compare, summarize, BenchmarkRecord, ComparisonRow, IngestionDashboard, MetricsStore, SummaryStats,
};
use crate::pipeline::{PipelineStep, StepResult};
use chrono::Local;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

/// Row of `summary_<suite>.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub query_name: String,
    pub count: usize,
    pub avg_execution_time: f64,
    pub min_execution_time: f64,
    pub max_execution_time: f64,
    pub std_execution_time: Option<f64>,
    pub success_rate: f64,
    pub avg_memory_used: Option<f64>,
    pub max_memory_used: Option<f64>,
    pub avg_cpu_used: Option<f64>,
    pub max_cpu_used: Option<f64>,
    pub avg_io_used: Option<f64>,
    pub max_io_used: Option<f64>,
}

/// Row of `comparison.csv`; undefined percentages are written as `N/A`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonCsvRow {
    pub query_name: String,
    pub a_avg_time: Option<f64>,
    pub b_avg_time: Option<f64>,
    pub time_diff: Option<f64>,
    pub time_diff_pct: String,
    pub a_avg_memory: Option<f64>,
    pub b_avg_memory: Option<f64>,
    pub memory_diff_pct: String,
    pub a_success_rate: Option<f64>,
    pub b_success_rate: Option<f64>,
}

pub fn summary_rows(stats: &SummaryStats) -> Vec<SummaryRow> {
    let mean = |r: Option<ResourceStats>| r.map(|s| s.mean);
    let max = |r: Option<ResourceStats>| r.map(|s| s.max);
    stats
        .values()
        .map(|s| SummaryRow {
            query_name: s.key.clone(),
            count: s.count,
            avg_execution_time: s.mean,
            min_execution_time: s.min,
            max_execution_time: s.max,
            std_execution_time: s.std_dev,
            success_rate: s.success_rate * 100.0,
            avg_memory_used: mean(s.memory),
            max_memory_used: max(s.memory),
            avg_cpu_used: mean(s.cpu),
            max_cpu_used: max(s.cpu),
            avg_io_used: mean(s.io),
            max_io_used: max(s.io),
        })
        .collect()
}

pub fn comparison_rows(rows: &[ComparisonRow]) -> Vec<ComparisonCsvRow> {
    rows.iter()
        .map(|r| ComparisonCsvRow {
            query_name: r.key.clone(),
            a_avg_time: r.a_mean,
            b_avg_time: r.b_mean,
            time_diff: r.abs_delta,
            time_diff_pct: format_pct(r.pct_delta),
            a_avg_memory: r.a_memory,
            b_avg_memory: r.b_memory,
            memory_diff_pct: format_pct(r.memory_pct_delta),
            a_success_rate: r.a_success_rate.map(|v| v * 100.0),
            b_success_rate: r.b_success_rate.map(|v| v * 100.0),
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Benchmark results for one suite, if its results file exists.
fn load_suite(path: &Path) -> Result<Option<Vec<BenchmarkRecord>>> {
    if !path.exists() {
        warn!("Results file {} not found, skipping", path.display());
        return Ok(None);
    }
    let records = read_records(path)?;
    info!("Loaded {} results from {}", records.len(), path.display());
    Ok(Some(records))
}

/// A summarized suite ready for rendering.
pub struct SuiteReport {
    pub label: &'static str,
    pub slug: &'static str,
    pub stats: SummaryStats,
}

pub struct ReportInput<'a> {
    pub settings: &'a ReportSettings,
    pub suites: &'a [SuiteReport],
    pub comparison: Option<&'a [ComparisonRow]>,
    pub dashboard: &'a IngestionDashboard,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn num(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v))
}

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 20px; }
        h1 { color: #333366; }
        h2 { color: #333366; margin-top: 30px; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
        th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
        th { background-color: #f2f2f2; }
        tr:nth-child(even) { background-color: #f9f9f9; }
        .good { color: green; }
        .bad { color: red; }
        .bar-row { display: flex; align-items: center; margin: 2px 0; }
        .bar-label { width: 160px; font-size: 12px; }
        .bar { background-color: #4a6fa5; height: 14px; }
        .bar.b { background-color: #c47f2c; }
        .bar-value { margin-left: 6px; font-size: 12px; }
"#;

/// Render the complete HTML document.
pub fn render_html(input: &ReportInput<'_>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n<p>Report generated on {now}</p>\n",
        title = escape(&input.settings.title),
        STYLE = STYLE,
        now = Local::now().format("%Y-%m-%d %H:%M:%S"),
    );

    for suite in input.suites {
        render_suite(&mut html, suite, input.settings.include_charts);
    }

    if let Some(rows) = input.comparison {
        render_comparison(&mut html, rows, input.settings.include_charts);
    }

    render_ingestion(&mut html, input.dashboard, input.settings.include_charts);
    html.push_str("</body>\n</html>\n");
    html
}

fn render_suite(html: &mut String, suite: &SuiteReport, charts: bool) {
    let groups: Vec<_> = suite.stats.values().collect();
    let total = groups.len();
    let avg_time = if total == 0 {
        0.0
    } else {
        groups.iter().map(|g| g.mean).sum::<f64>() / total as f64
    };
    let success = if total == 0 {
        0.0
    } else {
        groups.iter().map(|g| g.success_rate).sum::<f64>() / total as f64 * 100.0
    };

    let _ = write!(
        html,
        "<div class=\"summary\" id=\"summary-{slug}\">\n<h2>Performance Summary: {label}</h2>\n<table>\n<tr><th>Metric</th><th>Value</th></tr>\n\
         <tr><td>Total Queries</td><td>{total}</td></tr>\n\
         <tr><td>Average Execution Time</td><td>{avg_time:.2} seconds</td></tr>\n\
         <tr><td>Overall Success Rate</td><td>{success:.2}%</td></tr>\n</table>\n</div>\n",
        slug = suite.slug,
        label = suite.label,
    );

    let _ = write!(
        html,
        "<div class=\"detailed-results\">\n<h2>Detailed Query Results: {}</h2>\n<table>\n\
         <tr><th>Query</th><th>Runs</th><th>Avg Time (s)</th><th>Min Time (s)</th><th>Max Time (s)</th>\
         <th>Std Dev</th><th>Avg Memory</th><th>Avg CPU</th><th>Success Rate</th></tr>\n",
        suite.label
    );
    for g in &groups {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>",
            escape(&g.key),
            g.count,
            g.mean,
            g.min,
            g.max,
            num(g.std_dev),
            num(g.memory.map(|m| m.mean)),
            num(g.cpu.map(|c| c.mean)),
            g.success_rate * 100.0
        );
    }
    html.push_str("</table>\n</div>\n");

    if charts && !groups.is_empty() {
        let _ = writeln!(html, "<div class=\"charts\">\n<h3>Execution Time by Query: {}</h3>", suite.label);
        let bars: Vec<(&str, f64)> = groups.iter().map(|g| (g.key.as_str(), g.mean)).collect();
        render_bars(html, &bars, "");
        html.push_str("</div>\n");
    }
}

fn render_comparison(html: &mut String, rows: &[ComparisonRow], charts: bool) {
    html.push_str(
        "<div class=\"comparison\">\n<h2>Cluster Comparison</h2>\n<table>\n\
         <tr><th>Query</th><th>A Avg Time (s)</th><th>B Avg Time (s)</th><th>Time Diff (s)</th>\
         <th>Time Diff (%)</th><th>A Memory</th><th>B Memory</th><th>Memory Diff (%)</th></tr>\n",
    );
    for row in rows {
        // negative means B was faster
        let class = match row.abs_delta {
            Some(d) if d < 0.0 => "good",
            Some(d) if d > 0.0 => "bad",
            _ => "",
        };
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{class}\">{}</td><td class=\"{class}\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&row.key),
            num(row.a_mean),
            num(row.b_mean),
            num(row.abs_delta),
            format_pct(row.pct_delta),
            num(row.a_memory),
            num(row.b_memory),
            format_pct(row.memory_pct_delta),
            class = class,
        );
    }
    html.push_str("</table>\n</div>\n");

    if charts && !rows.is_empty() {
        html.push_str("<div class=\"charts\">\n<h3>Execution Time Comparison</h3>\n");
        for row in rows {
            let a = format!("{} (A)", row.key);
            let b = format!("{} (B)", row.key);
            let max = row.a_mean.unwrap_or(0.0).max(row.b_mean.unwrap_or(0.0));
            render_bar(html, &a, row.a_mean.unwrap_or(0.0), max, "");
            render_bar(html, &b, row.b_mean.unwrap_or(0.0), max, " b");
        }
        html.push_str("</div>\n");
    }
}

fn render_ingestion(html: &mut String, dashboard: &IngestionDashboard, charts: bool) {
    if dashboard.total_ingestions == 0 {
        return;
    }
    let _ = write!(
        html,
        "<div class=\"ingestion\">\n<h2>Ingestion Summary</h2>\n<table>\n<tr><th>Metric</th><th>Value</th></tr>\n\
         <tr><td>Total Ingestions</td><td>{}</td></tr>\n\
         <tr><td>Successful</td><td>{}</td></tr>\n\
         <tr><td>Failed</td><td>{}</td></tr>\n\
         <tr><td>Average Ingestion Time</td><td>{} seconds</td></tr>\n</table>\n",
        dashboard.total_ingestions,
        dashboard.successful_ingestions,
        dashboard.failed_ingestions,
        num(dashboard.average_ingestion_time),
    );
    for (title, stats) in [
        ("By Format", &dashboard.by_format),
        ("By Size", &dashboard.by_size),
        ("By Data Lake", &dashboard.by_data_lake),
    ] {
        let _ = writeln!(
            html,
            "<h3>{}</h3>\n<table>\n<tr><th>Group</th><th>Ingestions</th><th>Avg Time (s)</th><th>Success Rate</th></tr>",
            title
        );
        for g in stats.values() {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}%</td></tr>",
                escape(&g.key),
                g.count,
                g.mean,
                g.success_rate * 100.0
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("<h3>Ingestion Trend</h3>\n<table>\n<tr><th>Timestamp</th><th>Format</th><th>Time (s)</th></tr>\n");
    for point in &dashboard.trend {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{:.2}</td></tr>",
            point.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape(&point.file_format),
            point.ingestion_time_seconds
        );
    }
    html.push_str("</table>\n");
    if charts {
        let labels: Vec<String> = dashboard
            .trend
            .iter()
            .map(|p| format!("{} {}", p.timestamp.format("%m-%d %H:%M"), p.file_format))
            .collect();
        let bars: Vec<(&str, f64)> = labels
            .iter()
            .zip(&dashboard.trend)
            .map(|(label, p)| (label.as_str(), p.ingestion_time_seconds))
            .collect();
        html.push_str("<div class=\"charts\">\n<h3>Ingestion Time Trend</h3>\n");
        render_bars(html, &bars, "");
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");
}

fn render_bars(html: &mut String, bars: &[(&str, f64)], class: &str) {
    let max = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    for (label, value) in bars {
        render_bar(html, label, *value, max, class);
    }
}

fn render_bar(html: &mut String, label: &str, value: f64, max: f64, class: &str) {
    let width = if max > 0.0 { (value / max * 400.0).round() } else { 0.0 };
    let _ = writeln!(
        html,
        "<div class=\"bar-row\"><span class=\"bar-label\">{}</span><span class=\"bar{}\" style=\"width: {}px\"></span><span class=\"bar-value\">{:.2}s</span></div>",
        escape(label),
        class,
        width,
        value
    );
}

pub async fn run(ctx: &StageContext<'_>) -> Result<StepResult> {
    let settings = ReportSettings::from_config(ctx.config);
    let results = &ctx.dirs.results;
    let reports = &ctx.dirs.reports;
    std::fs::create_dir_all(reports)?;

    let by_query = |r: &BenchmarkRecord| r.query_name.clone();
    let mut suites = Vec::new();
    for (label, slug, file) in [
        ("Dremio A", "a", RESULTS_A_FILE),
        ("Dremio B", "b", RESULTS_B_FILE),
        ("Cross-cluster", "cross", RESULTS_CROSS_FILE),
    ] {
        if let Some(records) = load_suite(&results.join(file))? {
            let stats = summarize(&records, by_query);
            write_csv(&reports.join(format!("summary_{}.csv", slug)), &summary_rows(&stats))?;
            suites.push(SuiteReport { label, slug, stats });
        }
    }

    let a = suites.iter().find(|s| s.slug == "a");
    let b = suites.iter().find(|s| s.slug == "b");
    let comparison = match (a, b) {
        (Some(a), Some(b)) => {
            let rows = compare(&a.stats, &b.stats);
            write_csv(&reports.join("comparison.csv"), &comparison_rows(&rows))?;
            Some(rows)
        }
        _ => None,
    };

    let dashboard = MetricsStore::new(&ctx.dirs.metrics).dashboard()?;
    dashboard.write_json(&reports.join("dashboard.json"))?;

    if suites.is_empty() && dashboard.total_ingestions == 0 {
        return Ok(StepResult::failed(
            PipelineStep::Report,
            format!("No benchmark results found in {}", results.display()),
        ));
    }

    let html = render_html(&ReportInput {
        settings: &settings,
        suites: &suites,
        comparison: comparison.as_deref(),
        dashboard: &dashboard,
    });
    let html_path = reports.join("report.html");
    std::fs::write(&html_path, html)?;
    info!("Generated HTML report: {}", html_path.display());

    Ok(StepResult::succeeded(
        PipelineStep::Report,
        format!("Report written to {}", html_path.display()),
    ))
}
