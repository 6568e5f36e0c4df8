//! HTTP harness runner
//!
//! POSTs `{suiteId, environment, attempt}` to `<endpoint>/suites/<id>/runs`
//! and expects a JSON array of results back, optionally wrapped as
//! `{"results": [...]}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::RunnerError;
use crate::executor::Runner;
use crate::models::{Environment, TestExecutionResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    suite_id: &'a str,
    environment: Environment,
    attempt: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunResponse {
    Bare(Vec<TestExecutionResult>),
    Wrapped { results: Vec<TestExecutionResult> },
}

impl RunResponse {
    fn into_results(self) -> Vec<TestExecutionResult> {
        match self {
            RunResponse::Bare(results) | RunResponse::Wrapped { results } => results,
        }
    }
}

/// Runner backed by an external test harness service
#[derive(Clone, Debug)]
pub struct HttpRunner {
    client: Client,
    endpoint: Url,
}

impl HttpRunner {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid runner endpoint: {endpoint}"))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Runner endpoint must be an http(s) base URL: {endpoint}");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, endpoint })
    }

    /// `<endpoint>/suites/<id>/runs` with the suite id as one encoded segment
    fn run_url(&self, suite_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("suites")
                .push(suite_id)
                .push("runs");
        }
        url
    }
}

#[async_trait]
impl Runner for HttpRunner {
    async fn invoke(
        &self,
        suite_id: &str,
        environment: Environment,
        attempt: u32,
    ) -> Result<Vec<TestExecutionResult>, RunnerError> {
        let url = self.run_url(suite_id);
        debug!("POST {} (attempt {})", url, attempt);

        let response = self
            .client
            .post(url)
            .json(&RunRequest {
                suite_id,
                environment,
                attempt,
            })
            .send()
            .await
            .map_err(|e| RunnerError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunnerError::Harness(format!("{status}: {body}")));
        }

        let body: RunResponse = response
            .json()
            .await
            .map_err(|e| RunnerError::InvalidResponse(e.to_string()))?;

        Ok(body.into_results())
    }
}
