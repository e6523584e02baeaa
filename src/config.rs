//! Configuration types for acquisition requests.
//!
//! All pipeline behaviour is controlled through [`IngestConfig`], built via its
//! [`IngestConfigBuilder`]. One struct holds every knob so the same config can
//! be shared by the CLI, the HTTP server and library callers, and logged in
//! full when a run misbehaves.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Desktop Chrome on Windows. Sites that gate on user-agent see an ordinary
/// browser rather than `HeadlessChrome`.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Configuration for acquisition requests.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use comic_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .uploads_root("/var/lib/comic-ingest/uploads")
///     .max_candidates(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_candidates, 3);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Directory holding uploaded originals and one subdirectory per session.
    /// Default: `uploads`.
    pub uploads_root: PathBuf,

    /// Origin under which `/uploads/...` is publicly served.
    /// Default: `http://localhost:5000`.
    pub public_base_url: String,

    /// Translation worker endpoint. Default: `http://127.0.0.1:8000/process`.
    pub worker_endpoint: String,

    /// Optional bound on a single worker call. Default: none (wait forever).
    pub worker_timeout_secs: Option<u64>,

    /// Bound on one remote image download, end to end. Default: 10.
    pub fetch_timeout_secs: u64,

    /// Reject downloads whose first bytes are not a known image signature.
    /// Default: true.
    pub verify_image_format: bool,

    /// Bound on navigation plus network settling. Default: 60.
    pub navigation_timeout_secs: u64,

    /// An `<img>` qualifies only when its natural height is strictly greater
    /// than this. Default: 500.
    pub min_image_height: u32,

    /// Upper bound on discovered candidates sent to the worker. Default: 5.
    pub max_candidates: usize,

    /// Pause before the fallback screenshot so late animations finish.
    /// Default: 2000.
    pub screenshot_settle_ms: u64,

    /// Browser viewport width in CSS pixels. Default: 1280.
    pub viewport_width: u32,

    /// Browser viewport height in CSS pixels. Default: 1080.
    pub viewport_height: u32,

    /// User-agent presented to the target site.
    pub user_agent: String,

    /// Explicit Chrome/Chromium binary. If None, chromiumoxide searches PATH.
    pub chrome_executable: Option<PathBuf>,

    /// Run the browser with a visible window. Default: false.
    pub headful: bool,

    /// Batch candidates in flight at once. Default: 1 (strictly sequential).
    ///
    /// Values above 1 overlap downloads and worker calls; output order still
    /// follows the discovery order.
    pub concurrency: usize,

    /// Optional progress callback for per-candidate events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            uploads_root: PathBuf::from("uploads"),
            public_base_url: "http://localhost:5000".to_string(),
            worker_endpoint: "http://127.0.0.1:8000/process".to_string(),
            worker_timeout_secs: None,
            fetch_timeout_secs: 10,
            verify_image_format: true,
            navigation_timeout_secs: 60,
            min_image_height: 500,
            max_candidates: 5,
            screenshot_settle_ms: 2000,
            viewport_width: 1280,
            viewport_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_executable: None,
            headful: false,
            concurrency: 1,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("uploads_root", &self.uploads_root)
            .field("public_base_url", &self.public_base_url)
            .field("worker_endpoint", &self.worker_endpoint)
            .field("worker_timeout_secs", &self.worker_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("verify_image_format", &self.verify_image_format)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("min_image_height", &self.min_image_height)
            .field("max_candidates", &self.max_candidates)
            .field("screenshot_settle_ms", &self.screenshot_settle_ms)
            .field("viewport", &(self.viewport_width, self.viewport_height))
            .field("chrome_executable", &self.chrome_executable)
            .field("headful", &self.headful)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn uploads_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.uploads_root = root.into();
        self
    }

    pub fn public_base_url(mut self, base: impl Into<String>) -> Self {
        self.config.public_base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn worker_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.worker_endpoint = endpoint.into();
        self
    }

    pub fn worker_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.worker_timeout_secs = secs.filter(|s| *s > 0);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn verify_image_format(mut self, v: bool) -> Self {
        self.config.verify_image_format = v;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs.max(1);
        self
    }

    pub fn min_image_height(mut self, px: u32) -> Self {
        self.config.min_image_height = px;
        self
    }

    pub fn max_candidates(mut self, n: usize) -> Self {
        self.config.max_candidates = n;
        self
    }

    pub fn screenshot_settle_ms(mut self, ms: u64) -> Self {
        self.config.screenshot_settle_ms = ms;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width.clamp(320, 7680);
        self.config.viewport_height = height.clamp(240, 4320);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn headful(mut self, v: bool) -> Self {
        self.config.headful = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.max_candidates == 0 {
            return Err(IngestError::InvalidConfig(
                "max_candidates must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(IngestError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !is_http_url(&c.worker_endpoint) {
            return Err(IngestError::InvalidConfig(format!(
                "Worker endpoint must be an HTTP(S) URL, got '{}'",
                c.worker_endpoint
            )));
        }
        if !is_http_url(&c.public_base_url) {
            return Err(IngestError::InvalidConfig(format!(
                "Public base URL must be an HTTP(S) URL, got '{}'",
                c.public_base_url
            )));
        }
        if c.uploads_root.as_os_str().is_empty() {
            return Err(IngestError::InvalidConfig(
                "uploads_root must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    matches!(
        reqwest::Url::parse(s).map(|u| u.scheme().to_string()).as_deref(),
        Ok("http") | Ok("https")
    )
}
