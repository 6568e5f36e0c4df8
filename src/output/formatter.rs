//! Output formatters for executions and run reports
//!
//! Provides Table, JSON, CSV and summary output formats.

use serde::Serialize;
use std::io::Write;
use tracing::warn;

use super::presentation::{status_to_presentation, Color};
use crate::models::{ExecutionStatus, RunReport, RunStatus, TestExecution, TestSuite};
use crate::orchestrator::Stats;
use crate::results::{HealthLevel, OverallStats, SuccessRate, SuiteHealth};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn status(&self, status: ExecutionStatus) -> String {
        status_to_presentation(status).render(self.colorize)
    }

    fn paint(&self, color: Color, text: &str) -> String {
        if self.colorize {
            color.paint(text)
        } else {
            text.to_string()
        }
    }

    /// Format a single execution
    pub fn format_execution(&self, exec: &TestExecution) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(exec),
            OutputFormat::Csv => executions_csv(std::slice::from_ref(exec)),
            OutputFormat::Summary => self.format_execution_summary(exec),
            OutputFormat::Table => self.format_execution_table(exec),
        }
    }

    fn format_execution_table(&self, exec: &TestExecution) -> String {
        let mut output = format!(
            "{:24} #{} {:16} [{:>7}]  {}\n",
            exec.suite_id,
            exec.attempt,
            self.status(exec.status),
            duration_label(exec),
            exec.environment
        );
        for result in &exec.results {
            let line = format!(
                "    - {:32} {:?} ({}ms)",
                result.test_id, result.status, result.duration_ms
            );
            output.push_str(&line);
            if let Some(error) = &result.error {
                output.push_str(&format!(": {error}"));
            }
            output.push('\n');
        }
        if let Some(error) = &exec.error {
            output.push_str(&format!("    ! {error}\n"));
        }
        output
    }

    fn format_execution_summary(&self, exec: &TestExecution) -> String {
        let hint = status_to_presentation(exec.status);
        format!(
            "{} {} attempt {} ({}/{} passed, {})",
            hint.symbol,
            exec.suite_id,
            exec.attempt,
            exec.passed_tests(),
            exec.results.len(),
            duration_label(exec)
        )
    }

    /// Format a list of executions, newest first
    pub fn format_history(&self, executions: &[TestExecution]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(executions),
            OutputFormat::Csv => executions_csv(executions),
            OutputFormat::Summary => executions
                .iter()
                .map(|e| self.format_execution_summary(e))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Table => {
                let mut output = String::new();
                output.push_str(&format!(
                    "{:24} {:>3} {:16} {:>9} {:12} {:>6}  {}\n",
                    "SUITE", "TRY", "STATUS", "DURATION", "ENVIRONMENT", "TESTS", "STARTED"
                ));
                output.push_str(&"─".repeat(96));
                output.push('\n');
                for exec in executions {
                    output.push_str(&format!(
                        "{:24} {:>3} {:16} {:>9} {:12} {:>6}  {}\n",
                        exec.suite_id,
                        exec.attempt,
                        self.status(exec.status),
                        duration_label(exec),
                        exec.environment.to_string(),
                        format!("{}/{}", exec.passed_tests(), exec.results.len()),
                        exec.start_time
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| "-".to_string())
                    ));
                }
                output
            }
        }
    }

    /// Format the outcome of a suite or pipeline run
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(report),
            OutputFormat::Csv => {
                let mut output = String::from("suite_id,status,attempts,execution_id\n");
                for suite in &report.suites {
                    output.push_str(&format!(
                        "{},{},{},{}\n",
                        suite.suite_id, suite.status, suite.attempts, suite.execution_id
                    ));
                }
                output
            }
            OutputFormat::Summary => format!(
                "{} {}: {}/{} suites completed in {}ms",
                report.target,
                report.status,
                report.count(ExecutionStatus::Completed),
                report.suites.len(),
                report.duration_ms()
            ),
            OutputFormat::Table => self.format_report_table(report),
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  {:58}  ║\n", report.target.to_string()));
        output.push_str(&format!("║  run {:55} ║\n", report.run_id));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for suite in &report.suites {
            output.push_str(&format!(
                "║  {:28} {:16} attempts: {:<3}\n",
                suite.suite_id,
                self.status(suite.status),
                suite.attempts
            ));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let outcome = match report.status {
            RunStatus::Completed => self.paint(Color::Green, "COMPLETED"),
            RunStatus::Failed => self.paint(Color::Red, "FAILED"),
            RunStatus::Cancelled => self.paint(Color::Yellow, "CANCELLED"),
        };
        output.push_str(&format!(
            "║  {} | Pass: {} | Fail: {} | Skip: {} | Cancelled: {}\n",
            outcome,
            report.count(ExecutionStatus::Completed),
            report.count(ExecutionStatus::Failed),
            report.count(ExecutionStatus::Skipped),
            report.count(ExecutionStatus::Cancelled)
        ));
        output.push_str(&format!(
            "║  Environment: {} | Duration: {}ms\n",
            report.environment,
            report.duration_ms()
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    /// Format a success rate or overall statistics
    pub fn format_stats(&self, stats: &Stats) -> String {
        match stats {
            Stats::Suite(rate) => self.format_success_rate(rate),
            Stats::Overall(overall) => self.format_overall(overall),
        }
    }

    fn format_success_rate(&self, rate: &SuccessRate) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(rate),
            OutputFormat::Csv => format!(
                "suite_id,window,completed,terminal,rate,no_data\n{},{},{},{},{:.4},{}\n",
                rate.suite_id.as_deref().unwrap_or(""),
                rate.window,
                rate.completed,
                rate.terminal,
                rate.rate,
                rate.no_data
            ),
            OutputFormat::Table | OutputFormat::Summary => {
                let name = rate.suite_id.as_deref().unwrap_or("all suites");
                if rate.no_data {
                    format!("{name}: no data in the last {} executions", rate.window)
                } else {
                    format!(
                        "{}: {} ({}/{} of the last {} executions completed)",
                        name,
                        self.rate_label(rate.rate),
                        rate.completed,
                        rate.terminal,
                        rate.window
                    )
                }
            }
        }
    }

    fn format_overall(&self, stats: &OverallStats) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(stats),
            OutputFormat::Csv => format!(
                "window,total,passed,failed,skipped,cancelled,active,success_rate,avg_duration_ms\n\
                 {},{},{},{},{},{},{},{:.4},{:.1}\n",
                stats.window,
                stats.total,
                stats.passed,
                stats.failed,
                stats.skipped,
                stats.cancelled,
                stats.active,
                stats.success_rate,
                stats.avg_duration_ms
            ),
            OutputFormat::Summary => format!(
                "{}/{} passed ({}), avg {:.0}ms",
                stats.passed,
                stats.total,
                self.rate_label(stats.success_rate),
                stats.avg_duration_ms
            ),
            OutputFormat::Table => {
                let mut output = String::new();
                output.push_str("\n═══════════════════════════════════════════════════════════════\n");
                output.push_str(&format!(" Overall Statistics (last {} executions)\n", stats.window));
                output.push_str("═══════════════════════════════════════════════════════════════\n");
                if stats.no_data {
                    output.push_str(" No finished executions yet\n");
                    return output;
                }
                output.push_str(&format!(
                    " Total: {} | Pass: {} | Fail: {} | Skip: {} | Cancelled: {} | Active: {}\n",
                    stats.total,
                    stats.passed,
                    stats.failed,
                    stats.skipped,
                    stats.cancelled,
                    stats.active
                ));
                output.push_str(&format!(
                    " Success Rate: {} | Avg Duration: {:.0}ms\n",
                    self.rate_label(stats.success_rate),
                    stats.avg_duration_ms
                ));
                output
            }
        }
    }

    /// Format per-suite health
    pub fn format_health(&self, health: &[SuiteHealth]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(health),
            OutputFormat::Csv => {
                let mut output =
                    String::from("suite_id,level,success_rate,avg_duration_ms,last_status\n");
                for h in health {
                    output.push_str(&format!(
                        "{},{},{:.4},{:.1},{}\n",
                        h.suite_id,
                        h.level,
                        h.success.rate,
                        h.avg_duration_ms,
                        h.last_status.map(|s| s.to_string()).unwrap_or_default()
                    ));
                }
                output
            }
            OutputFormat::Table | OutputFormat::Summary => {
                let mut output = String::new();
                for h in health {
                    let bar_len = ((h.success.rate * 20.0).round() as usize).min(20);
                    let level = match h.level {
                        HealthLevel::Healthy => self.paint(Color::Green, "healthy"),
                        HealthLevel::Degraded => self.paint(Color::Yellow, "degraded"),
                        HealthLevel::Failing => self.paint(Color::Red, "failing"),
                        HealthLevel::Unknown => self.paint(Color::Gray, "unknown"),
                    };
                    output.push_str(&format!(
                        " {:24} {}{} {:>6.1}% {:>7.0}ms  {}\n",
                        h.suite_id,
                        "█".repeat(bar_len),
                        "░".repeat(20 - bar_len),
                        h.success.percent(),
                        h.avg_duration_ms,
                        level
                    ));
                }
                output
            }
        }
    }

    /// Format registered suites
    pub fn format_suites<'a>(&self, suites: impl IntoIterator<Item = &'a TestSuite>) -> String {
        let suites: Vec<&TestSuite> = suites.into_iter().collect();
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(&suites),
            _ => {
                let mut output = String::new();
                for suite in suites {
                    output.push_str(&format!(
                        "{:24} {:14} {:9} {:12} {}",
                        suite.id,
                        suite.suite_type.to_string(),
                        suite.priority.to_string(),
                        suite.environment.to_string(),
                        if suite.parallelizable { "parallel" } else { "serial" }
                    ));
                    if !suite.dependencies.is_empty() {
                        output.push_str(&format!("  <- {}", suite.dependencies.join(", ")));
                    }
                    output.push('\n');
                }
                output
            }
        }
    }

    fn rate_label(&self, rate: f64) -> String {
        let text = format!("{:.1}%", rate * 100.0);
        let color = if rate >= 0.9 {
            Color::Green
        } else if rate >= 0.5 {
            Color::Yellow
        } else {
            Color::Red
        };
        self.paint(color, &text)
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn duration_label(exec: &TestExecution) -> String {
    exec.duration_ms()
        .map(|d| format!("{d}ms"))
        .unwrap_or_else(|| "-".to_string())
}

fn executions_csv(executions: &[TestExecution]) -> String {
    match write_executions_csv(executions) {
        Ok(csv) => csv,
        Err(e) => {
            warn!("Failed to render CSV: {}", e);
            String::new()
        }
    }
}

fn write_executions_csv(executions: &[TestExecution]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "suite_id",
        "attempt",
        "status",
        "environment",
        "duration_ms",
        "passed",
        "total",
        "error",
    ])?;
    for exec in executions {
        writer.write_record([
            exec.id.clone(),
            exec.suite_id.clone(),
            exec.attempt.to_string(),
            exec.status.to_string(),
            exec.environment.to_string(),
            exec.duration_ms().map(|d| d.to_string()).unwrap_or_default(),
            exec.passed_tests().to_string(),
            exec.results.len().to_string(),
            exec.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Write formatted content to a file
pub fn write_to_file(path: &str, content: &str) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
