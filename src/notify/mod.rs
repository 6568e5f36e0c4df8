//! Run outcome notifications
//!
//! The scheduler calls a `NotificationSink` once per finished pipeline run.
//! Delivery problems are logged and never reach the caller.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{RunReport, RunStatus};

/// Receives pipeline run outcomes
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, report: &RunReport);
}

/// Writes outcomes to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, report: &RunReport) {
        match report.status {
            RunStatus::Completed => info!(
                "Run {} for {} completed ({} suites, {}ms)",
                report.run_id,
                report.target,
                report.suites.len(),
                report.duration_ms()
            ),
            status => warn!(
                "Run {} for {} {} ({} suites, {}ms)",
                report.run_id,
                report.target,
                status,
                report.suites.len(),
                report.duration_ms()
            ),
        }
    }
}

/// POSTs the JSON report to every `webhook` target of the run
#[derive(Clone)]
pub struct WebhookSink {
    client: Client,
}

impl WebhookSink {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, report: &RunReport) {
        let deliveries = report
            .notifications
            .iter()
            .filter(|target| target.kind == "webhook")
            .map(|target| async move {
                let result = self
                    .client
                    .post(&target.destination)
                    .json(report)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status());

                match result {
                    Ok(_) => debug!("Delivered run {} to {}", report.run_id, target.destination),
                    Err(e) => warn!(
                        "Failed to deliver run {} to {}: {}",
                        report.run_id, target.destination, e
                    ),
                }
            });

        join_all(deliveries).await;
    }
}

/// Fans a report out to several sinks in order
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

#[async_trait]
impl NotificationSink for SinkChain {
    async fn notify(&self, report: &RunReport) {
        for sink in &self.sinks {
            sink.notify(report).await;
        }
    }
}
