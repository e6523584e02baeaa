//! Fakes and loopback fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::Path as UrlPath;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use comic_ingest::pipeline::fetch::ImageFetcher;
use comic_ingest::pipeline::render::{RenderResult, Renderer};
use comic_ingest::pipeline::worker::{TranslateRequest, TranslationWorker};
use comic_ingest::{FetchError, IngestConfig, RenderError, WorkerError};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Smallest byte string `image::guess_format` accepts as PNG, plus padding.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";

pub fn test_config(root: &Path) -> IngestConfig {
    IngestConfig::builder()
        .uploads_root(root)
        .public_base_url("http://localhost:5000")
        .build()
        .unwrap()
}

pub fn chapter_urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("https://cdn.example/ch1/{i}.jpg"))
        .collect()
}

// ── Renderer ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Script {
    Discover(Vec<String>),
    Screenshot,
    Fail(RenderError),
}

pub struct ScriptedRenderer {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, _url: &str, screenshot_path: &Path) -> Result<RenderResult, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Discover(urls) => Ok(RenderResult::Discovered(urls.clone())),
            Script::Screenshot => {
                tokio::fs::write(screenshot_path, PNG)
                    .await
                    .map_err(|e| RenderError::Screenshot(e.to_string()))?;
                Ok(RenderResult::Screenshot(screenshot_path.to_path_buf()))
            }
            Script::Fail(e) => Err(e.clone()),
        }
    }
}

// ── Fetcher ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeFetcher {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn delay(mut self, url: &str, d: Duration) -> Self {
        self.delays.insert(url.to_string(), d);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(d) = self.delays.get(url) {
            tokio::time::sleep(*d).await;
        }
        if self.failing.contains(url) {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        }
        tokio::fs::write(destination, PNG)
            .await
            .map_err(|e| FetchError::Io {
                detail: e.to_string(),
            })?;
        Ok(PNG.len() as u64)
    }
}

// ── Worker ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeWorker {
    failing_inputs: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub jobs: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any job whose input file has this name.
    pub fn failing(mut self, input_name: &str) -> Self {
        self.failing_inputs.insert(input_name.to_string());
        self
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    pub fn jobs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.jobs.lock().unwrap().clone()
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<(), WorkerError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_inputs.contains(&name) {
            return Err(WorkerError::Rejected {
                status: 500,
                detail: "Processing failed".into(),
            });
        }
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| WorkerError::Transport {
                detail: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl TranslationWorker for FakeWorker {
    async fn translate(&self, input: &Path, output: &Path) -> Result<(), WorkerError> {
        self.jobs
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.run(input, output).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ── Loopback HTTP ───────────────────────────────────────────────────────────

pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Image host: `/img/missing.png` is 404, `/img/page.html` is HTML,
/// `/img/slow.png` stalls for 5 s, anything else is a PNG.
pub fn image_host() -> Router {
    Router::new().route("/img/{name}", get(serve_image))
}

async fn serve_image(UrlPath(name): UrlPath<String>) -> Response {
    match name.as_str() {
        "missing.png" => StatusCode::NOT_FOUND.into_response(),
        "page.html" => (
            [(header::CONTENT_TYPE, "text/html")],
            "<!DOCTYPE html><html><body>blocked</body></html>",
        )
            .into_response(),
        "slow.png" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ([(header::CONTENT_TYPE, "image/png")], PNG.to_vec()).into_response()
        }
        _ => ([(header::CONTENT_TYPE, "image/png")], PNG.to_vec()).into_response(),
    }
}

/// Stand-in translation worker speaking the real wire format. Copies input to
/// output; inputs starting with `BAD` get a 500 with a FastAPI-style detail.
pub fn worker_app() -> Router {
    Router::new().route("/process", post(process))
}

async fn process(Json(req): Json<TranslateRequest>) -> Response {
    let input = match tokio::fs::read(&req.input_path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "File not found" })),
            )
                .into_response()
        }
    };
    if input.starts_with(b"BAD") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Processing failed" })),
        )
            .into_response();
    }
    if tokio::fs::write(&req.output_path, &input).await.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Cannot write output" })),
        )
            .into_response();
    }
    Json(json!({ "status": "success", "output": req.output_path })).into_response()
}
