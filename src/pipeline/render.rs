//! Page rendering: drive a browser to a URL and decide what to translate.
//!
//! ## Decision flow
//!
//! ```text
//! launch ─▶ navigate (≤ 60 s) ─▶ list <img> ─▶ select_candidates
//!                                                 │
//!                          non-empty ◀────────────┤
//!                          Discovered(urls)       │ empty
//!                                                 ▼
//!                                  settle 2 s ─▶ viewport screenshot
//!                                                Screenshot(path)
//! ```
//!
//! Every path ends in exactly one `close()` of the browser session, whether
//! navigation failed, extraction failed, or a result was produced.
//!
//! The browser itself sits behind [`BrowserLauncher`] / [`BrowserSession`] so
//! this module holds only the decision logic; [`crate::pipeline::chrome`]
//! supplies the Chrome implementation.

use crate::config::IngestConfig;
use crate::error::RenderError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One `<img>` as the browser sees it after layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageElement {
    /// Resolved source (`currentSrc`, falling back to `src`).
    pub src: String,
    #[serde(rename = "naturalHeight")]
    pub natural_height: u32,
}

/// What a successful render produced. Never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// Qualifying image URLs in document order. Always non-empty.
    Discovered(Vec<String>),
    /// The single viewport capture taken because discovery was empty.
    Screenshot(PathBuf),
}

/// Launch-time browser settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    pub chrome_executable: Option<PathBuf>,
    pub headful: bool,
}

impl BrowserOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            user_agent: config.user_agent.clone(),
            chrome_executable: config.chrome_executable.clone(),
            headful: config.headful,
        }
    }
}

/// Starts one isolated browser instance per call.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, RenderError>;
}

/// A live browser instance with one page open.
///
/// [`PageRenderer`] calls `close` exactly once per session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait until network activity settles. Unbounded; the
    /// renderer applies the timeout.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Every `<img>` on the page, in document order.
    async fn images(&mut self) -> Result<Vec<ImageElement>, RenderError>;

    /// Save a JPEG of the current viewport (not the full scrollable page).
    async fn screenshot(&mut self, path: &Path) -> Result<(), RenderError>;

    /// Release the browser process.
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Anything that can turn a URL into a [`RenderResult`].
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str, screenshot_path: &Path) -> Result<RenderResult, RenderError>;
}

/// Keep elements whose source is an absolute HTTP(S) URL and whose natural
/// height is strictly greater than `min_height`, in document order.
///
/// Duplicates are kept; a page that repeats an image repeats the candidate.
pub fn select_candidates(elements: &[ImageElement], min_height: u32) -> Vec<String> {
    elements
        .iter()
        .filter(|el| el.natural_height > min_height)
        .filter(|el| is_absolute_http(&el.src))
        .map(|el| el.src.clone())
        .collect()
}

fn is_absolute_http(src: &str) -> bool {
    reqwest::Url::parse(src)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// The [`Renderer`] used in production: one fresh browser per call.
pub struct PageRenderer {
    launcher: Arc<dyn BrowserLauncher>,
    options: BrowserOptions,
    navigation_timeout: Duration,
    min_image_height: u32,
    screenshot_settle: Duration,
}

impl PageRenderer {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &IngestConfig) -> Self {
        Self {
            launcher,
            options: BrowserOptions::from_config(config),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            min_image_height: config.min_image_height,
            screenshot_settle: Duration::from_millis(config.screenshot_settle_ms),
        }
    }

    async fn drive(
        &self,
        browser: &mut dyn BrowserSession,
        url: &str,
        screenshot_path: &Path,
    ) -> Result<RenderResult, RenderError> {
        match tokio::time::timeout(self.navigation_timeout, browser.navigate(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    detail: format!(
                        "page did not settle within {}s",
                        self.navigation_timeout.as_secs()
                    ),
                })
            }
        }

        let elements = browser.images().await?;
        let candidates = select_candidates(&elements, self.min_image_height);
        debug!(
            "{} <img> elements, {} above {}px",
            elements.len(),
            candidates.len(),
            self.min_image_height
        );

        if !candidates.is_empty() {
            return Ok(RenderResult::Discovered(candidates));
        }

        info!("No qualifying images on {}; capturing viewport", url);
        tokio::time::sleep(self.screenshot_settle).await;
        browser.screenshot(screenshot_path).await?;
        Ok(RenderResult::Screenshot(screenshot_path.to_path_buf()))
    }
}

#[async_trait]
impl Renderer for PageRenderer {
    async fn render(&self, url: &str, screenshot_path: &Path) -> Result<RenderResult, RenderError> {
        info!("Rendering {}", url);
        let mut browser = self.launcher.launch(&self.options).await?;

        let outcome = self.drive(browser.as_mut(), url, screenshot_path).await;

        if let Err(e) = browser.close().await {
            warn!("Browser close after rendering {} failed: {}", url, e);
        }
        outcome
    }
}
