//! Execution history persistence
//!
//! Terminal execution records and run reports are stored as JSON under the
//! platform data directory so `history` and `stats` work across invocations.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{RunReport, TestExecution};

const HISTORY_FILE: &str = "history.json";
const RUNS_DIR: &str = "runs";
const HISTORY_VERSION: u32 = 1;

/// On-disk history document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredHistory {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub executions: Vec<TestExecution>,
}

/// Execution history storage manager
#[derive(Clone, Debug)]
pub struct HistoryStore {
    /// Base directory for history
    base_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Store under the platform data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("suite-orchestrator");
        Self::new(base_dir)
    }

    /// Configured directory, or the platform default
    pub fn from_config(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::new(dir),
            None => Self::default_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.base_dir.join(HISTORY_FILE)
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(RUNS_DIR).join(format!("{run_id}.json"))
    }

    /// Load stored executions in creation order; a missing file is an empty history
    pub fn load(&self) -> Result<Vec<TestExecution>> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let history: StoredHistory = read_json(&path)?;

        debug!(
            "Loaded {} executions from {}",
            history.executions.len(),
            path.display()
        );
        Ok(history.executions)
    }

    /// Replace the stored history
    pub fn save(&self, executions: &[TestExecution]) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)?;

        let path = self.history_path();
        let history = StoredHistory {
            version: HISTORY_VERSION,
            saved_at: Utc::now(),
            executions: executions.to_vec(),
        };

        let file = File::create(&path).context("Failed to create history file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), &history)
            .context("Failed to write history")?;

        debug!("Saved {} executions to {}", executions.len(), path.display());
        Ok(path)
    }

    /// Merge terminal records into the stored history, keeping the newest `limit`.
    ///
    /// Returns the number of records added.
    pub fn append(&self, executions: &[TestExecution], limit: usize) -> Result<usize> {
        let mut merged: IndexMap<String, TestExecution> = self
            .load()?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        let mut added = 0;
        for exec in executions.iter().filter(|e| e.status.is_terminal()) {
            if merged.insert(exec.id.clone(), exec.clone()).is_none() {
                added += 1;
            }
        }

        let excess = merged.len().saturating_sub(limit);
        let kept: Vec<TestExecution> = merged.into_values().skip(excess).collect();
        self.save(&kept)?;

        info!("Recorded {} executions in {}", added, self.base_dir.display());
        Ok(added)
    }

    /// Save a run report
    pub fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.run_path(&report.run_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path).context("Failed to create report file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .context("Failed to write report")?;

        debug!("Saved run report to {}", path.display());
        Ok(path)
    }

    /// Load a run report
    pub fn load_report(&self, run_id: &str) -> Result<RunReport> {
        read_json(&self.run_path(run_id))
    }

    /// All stored run reports, newest first
    pub fn list_reports(&self) -> Result<Vec<RunReport>> {
        let dir = self.base_dir.join(RUNS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match read_json::<RunReport>(&path) {
                    Ok(report) => reports.push(report),
                    Err(e) => debug!("Failed to load {}: {}", path.display(), e),
                }
            }
        }

        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(reports)
    }

    /// Export executions to a file
    pub fn export(
        &self,
        executions: &[TestExecution],
        path: &Path,
        format: ExportFormat,
    ) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)?;
                serde_json::to_writer_pretty(BufWriter::new(file), executions)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;

                writer.write_record([
                    "id",
                    "run_id",
                    "suite_id",
                    "attempt",
                    "status",
                    "environment",
                    "trigger",
                    "start_time",
                    "duration_ms",
                    "passed",
                    "failed",
                    "error",
                ])?;

                for exec in executions {
                    writer.write_record([
                        exec.id.clone(),
                        exec.run_id.clone(),
                        exec.suite_id.clone(),
                        exec.attempt.to_string(),
                        exec.status.to_string(),
                        exec.environment.to_string(),
                        exec.trigger.kind().to_string(),
                        exec.start_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                        exec.duration_ms().map(|d| d.to_string()).unwrap_or_default(),
                        exec.passed_tests().to_string(),
                        exec.failed_tests().to_string(),
                        exec.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported {} executions to {}", executions.len(), path.display());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
