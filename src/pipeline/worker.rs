//! Worker gateway: one synchronous translation job per call.
//!
//! The worker is a black box behind a fixed local endpoint. We hand it two
//! absolute paths; it reads the first, writes the second, then answers. Any
//! non-2xx status or transport failure is a [`WorkerError`]. There are no
//! retries here; whether to retry is the orchestrator's call, and it doesn't.

use crate::config::IngestConfig;
use crate::error::{IngestError, WorkerError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Submits translation jobs to the external worker.
#[async_trait]
pub trait TranslationWorker: Send + Sync {
    /// Translate `input` into `output`. On `Ok(())` the worker has written
    /// `output`.
    async fn translate(&self, input: &Path, output: &Path) -> Result<(), WorkerError>;
}

/// JSON body the worker expects.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslateRequest {
    pub input_path: String,
    pub output_path: String,
}

/// Error body the worker sends on failure (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
struct WorkerFailure {
    detail: serde_json::Value,
}

/// [`TranslationWorker`] that POSTs JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpWorker {
    client: reqwest::Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpWorker {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, IngestError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| IngestError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        Self::new(
            config.worker_endpoint.clone(),
            config.worker_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TranslationWorker for HttpWorker {
    async fn translate(&self, input: &Path, output: &Path) -> Result<(), WorkerError> {
        let body = TranslateRequest {
            input_path: input.to_string_lossy().into_owned(),
            output_path: output.to_string_lossy().into_owned(),
        };
        debug!("Worker job: {} → {}", body.input_path, body.output_path);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| match self.timeout {
                Some(t) if e.is_timeout() => WorkerError::Timeout { secs: t.as_secs() },
                _ => WorkerError::Transport {
                    detail: e.to_string(),
                },
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let detail = failure_detail(&text);
        warn!("Worker rejected {}: HTTP {} {}", body.input_path, status, detail);
        Err(WorkerError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Pull `detail` out of a FastAPI-style error body, falling back to the raw
/// text.
fn failure_detail(body: &str) -> String {
    match serde_json::from_str::<WorkerFailure>(body) {
        Ok(WorkerFailure {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(WorkerFailure { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}
