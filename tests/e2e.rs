//! End-to-end rendering tests against a real headless Chrome.
//!
//! These launch an actual browser and are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//! Set `COMIC_INGEST_CHROME` to point at a specific Chrome/Chromium binary.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

mod common;

use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use comic_ingest::pipeline::chrome::ChromeLauncher;
use comic_ingest::pipeline::render::{PageRenderer, RenderResult, Renderer};
use comic_ingest::{IngestConfig, RenderError};
use std::io::Cursor;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
    };
}

/// Browser logs show up with `--nocapture`; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("comic_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn config() -> IngestConfig {
    let mut builder = IngestConfig::builder()
        .navigation_timeout_secs(30)
        .screenshot_settle_ms(200);
    if let Ok(exe) = std::env::var("COMIC_INGEST_CHROME") {
        builder = builder.chrome_executable(exe);
    }
    builder.build().unwrap()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::from_pixel(width, height, image::Rgb([240, 240, 240]))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// `/chapter` has two tall pages around a small banner; `/empty` has none.
async fn site() -> String {
    let tall = png(40, 900);
    let small = png(40, 60);
    let router = Router::new()
        .route(
            "/chapter",
            get(|| async {
                Html(
                    r#"<html><body>
                    <img src="/p1.png"><img src="/banner.png"><img src="/p2.png">
                    </body></html>"#,
                )
            }),
        )
        .route(
            "/empty",
            get(|| async { Html("<html><body><h1>Reader</h1><canvas></canvas></body></html>") }),
        )
        .route(
            "/p1.png",
            get({
                let tall = tall.clone();
                move || async move { ([(header::CONTENT_TYPE, "image/png")], tall).into_response() }
            }),
        )
        .route(
            "/p2.png",
            get(move || async move { ([(header::CONTENT_TYPE, "image/png")], tall).into_response() }),
        )
        .route(
            "/banner.png",
            get(move || async move {
                ([(header::CONTENT_TYPE, "image/png")], small).into_response()
            }),
        );
    let addr = common::spawn(router).await;
    format!("http://{addr}")
}

#[tokio::test]
async fn chrome_discovers_tall_images_in_order() {
    e2e_skip_unless_enabled!();
    let base = site().await;
    let tmp = tempfile::tempdir().unwrap();
    let renderer = PageRenderer::new(Arc::new(ChromeLauncher), &config());

    let result = renderer
        .render(&format!("{base}/chapter"), &tmp.path().join("page_screenshot.jpg"))
        .await
        .unwrap();

    assert_eq!(
        result,
        RenderResult::Discovered(vec![format!("{base}/p1.png"), format!("{base}/p2.png")])
    );
}

#[tokio::test]
async fn chrome_falls_back_to_viewport_jpeg() {
    e2e_skip_unless_enabled!();
    let base = site().await;
    let tmp = tempfile::tempdir().unwrap();
    let shot = tmp.path().join("page_screenshot.jpg");
    let renderer = PageRenderer::new(Arc::new(ChromeLauncher), &config());

    let result = renderer.render(&format!("{base}/empty"), &shot).await.unwrap();

    assert_eq!(result, RenderResult::Screenshot(shot.clone()));
    let bytes = std::fs::read(&shot).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.width(), 1280);
}

#[tokio::test]
async fn chrome_reports_unreachable_page() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::tempdir().unwrap();
    let renderer = PageRenderer::new(Arc::new(ChromeLauncher), &config());

    let err = renderer
        .render("http://127.0.0.1:9/", &tmp.path().join("s.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::Navigation { .. }), "{err:?}");
}

#[tokio::test]
async fn concurrent_renders_get_separate_browsers() {
    e2e_skip_unless_enabled!();
    let base = site().await;
    let tmp = tempfile::tempdir().unwrap();
    let discovered_shot = tmp.path().join("a.jpg");
    let shot = tmp.path().join("b.jpg");
    let first = PageRenderer::new(Arc::new(ChromeLauncher), &config());
    let second = PageRenderer::new(Arc::new(ChromeLauncher), &config());
    let chapter = format!("{base}/chapter");
    let empty = format!("{base}/empty");

    let (a, b) = tokio::join!(
        first.render(&chapter, &discovered_shot),
        second.render(&empty, &shot),
    );

    assert_eq!(
        a.unwrap(),
        RenderResult::Discovered(vec![format!("{base}/p1.png"), format!("{base}/p2.png")])
    );
    assert_eq!(b.unwrap(), RenderResult::Screenshot(shot.clone()));
}
