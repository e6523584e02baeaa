//! Chrome implementation of [`BrowserLauncher`] over the DevTools protocol.
//!
//! chromiumoxide splits a browser into a [`Browser`] handle and a `Handler`
//! stream that must be polled for the connection to make progress. The
//! handler runs on its own task for the lifetime of the session and is
//! aborted in [`ChromeSession::close`] (or on drop, if a panic skipped it).
//!
//! Every launch gets its own throwaway profile directory. Without one,
//! chromiumoxide points every browser at the same `chromiumoxide-runner`
//! profile, and concurrent launches would contend for its lock and share
//! cookies.

use crate::error::RenderError;
use crate::pipeline::render::{BrowserLauncher, BrowserOptions, BrowserSession, ImageElement};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// `<img>` elements in document order with their resolved source.
const LIST_IMAGES_JS: &str = r#"(() => Array.from(document.querySelectorAll('img')).map(img => ({
    src: img.currentSrc || img.src || '',
    naturalHeight: img.naturalHeight || 0
})))()"#;

/// Readiness and resource count, polled until the count stops moving.
const NETWORK_PROBE_JS: &str = r#"(() => ({
    ready: document.readyState === 'complete',
    resources: performance.getEntriesByType('resource').length
}))()"#;

/// URL scheme of the document Chrome shows when a load fails.
const CHROME_ERROR_PREFIX: &str = "chrome-error://";

/// Gap between network probes.
const IDLE_POLL: Duration = Duration::from_millis(500);
/// Consecutive unchanged probes that count as idle.
const IDLE_ROUNDS: u32 = 2;

#[derive(Debug, Deserialize)]
struct NetworkProbe {
    ready: bool,
    resources: u64,
}

/// Launches a fresh headless Chrome per render.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, RenderError> {
        let profile = profile_dir()?;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(options.viewport_width, options.viewport_height)
            .viewport(Viewport {
                width: options.viewport_width,
                height: options.viewport_height,
                ..Default::default()
            })
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-blink-features=AutomationControlled");
        if let Some(ref exe) = options.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        if options.headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("CDP handler: {}", e);
                }
            }
        });

        let mut session = ChromeSession {
            browser: Some(browser),
            page: None,
            handler: Some(handler_task),
            profile: Some(profile),
        };

        if let Err(e) = session.open_page(&options.user_agent).await {
            // The process is already running; release it before reporting.
            if let Err(close_err) = session.close().await {
                warn!("Browser close after failed setup: {}", close_err);
            }
            return Err(e);
        }

        debug!("Browser launched");
        Ok(Box::new(session))
    }
}

/// One Chrome process with a single tab.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    /// Removed once the browser has exited.
    profile: Option<TempDir>,
}

impl ChromeSession {
    async fn open_page(&mut self, user_agent: &str) -> Result<(), RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Launch("browser already closed".into()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Launch(format!("new page: {e}")))?;
        page.set_user_agent(user_agent)
            .await
            .map_err(|e| RenderError::Launch(format!("user agent: {e}")))?;
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Extraction("no page open".into()))
    }
}

/// Fresh, empty Chrome profile for one launch.
fn profile_dir() -> Result<TempDir, RenderError> {
    tempfile::Builder::new()
        .prefix("comic-ingest-chrome-")
        .tempdir()
        .map_err(|e| RenderError::Launch(format!("profile directory: {e}")))
}

async fn eval<T: DeserializeOwned>(page: &Page, js: &str) -> Result<T, String> {
    let params = EvaluateParams::builder()
        .expression(js)
        .return_by_value(true)
        .await_promise(true)
        .build()?;
    page.evaluate_expression(params)
        .await
        .map_err(|e| e.to_string())?
        .into_value::<T>()
        .map_err(|e| e.to_string())
}

/// Poll until the document is complete and the resource count has held
/// still for [`IDLE_ROUNDS`] probes.
async fn wait_for_network_idle(page: &Page, url: &str) -> Result<(), RenderError> {
    let mut last: Option<u64> = None;
    let mut stable = 0;
    loop {
        let probe: NetworkProbe =
            eval(page, NETWORK_PROBE_JS)
                .await
                .map_err(|detail| RenderError::Navigation {
                    url: url.to_string(),
                    detail,
                })?;
        if probe.ready && last == Some(probe.resources) {
            stable += 1;
            if stable >= IDLE_ROUNDS {
                return Ok(());
            }
        } else {
            stable = 0;
        }
        last = Some(probe.resources);
        tokio::time::sleep(IDLE_POLL).await;
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let page = self.page()?;
        page.goto(url).await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        // Chrome swaps in its own error document instead of failing `goto`.
        let landed: String = eval(page, "location.href")
            .await
            .map_err(|detail| RenderError::Navigation {
                url: url.to_string(),
                detail,
            })?;
        if landed.starts_with(CHROME_ERROR_PREFIX) {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                detail: "page failed to load".to_string(),
            });
        }
        wait_for_network_idle(page, url).await?;
        debug!("Navigation settled: {}", url);
        Ok(())
    }

    async fn images(&mut self) -> Result<Vec<ImageElement>, RenderError> {
        eval(self.page()?, LIST_IMAGES_JS)
            .await
            .map_err(RenderError::Extraction)
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), RenderError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .full_page(false)
            .build();
        self.page()?
            .save_screenshot(params, path)
            .await
            .map_err(|e| RenderError::Screenshot(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.page.take();
        let result = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser.close().await;
                if closed.is_err() {
                    let _ = browser.kill().await;
                }
                if let Err(e) = browser.wait().await {
                    warn!("Waiting for browser exit: {}", e);
                }
                closed
                    .map(|_| ())
                    .map_err(|e| RenderError::Launch(format!("close: {e}")))
            }
            None => Ok(()),
        };
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if let Some(profile) = self.profile.take() {
            if let Err(e) = profile.close() {
                warn!("Removing browser profile: {}", e);
            }
        }
        debug!("Browser closed");
        result
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // chromiumoxide kills the child process when `Browser` drops; the
        // handler task has to be stopped by hand.
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_launch_gets_its_own_profile() {
        let a = profile_dir().unwrap();
        let b = profile_dir().unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir() && b.path().is_dir());
        assert!(std::fs::read_dir(a.path()).unwrap().next().is_none());

        let gone = a.path().to_path_buf();
        a.close().unwrap();
        assert!(!gone.exists());
    }
}
