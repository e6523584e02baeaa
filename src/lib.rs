//! # comic-ingest
//!
//! Acquire comic pages from the web or from uploads and hand each one to an
//! external translation worker, returning public URLs of the results.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page URL                                   uploaded file
//!  │                                              │
//!  ├─ 1. Session  fresh uploads/<id>/ directory   │
//!  ├─ 2. Render   headless Chrome, list tall <img>│
//!  │     └─ none? settle, viewport screenshot     │
//!  ├─ 3. Fetch    first N images → page_<n>.jpg   │
//!  ├─ 4. Worker   page_<n>.jpg → trans_<n>.jpg ◀──┘ <file> → trans_<file>
//!  └─ 5. Output   ordered public URLs + per-request stats
//! ```
//!
//! A failing batch image is skipped; the request still succeeds with the
//! rest. Only a failed render, unusable storage, or a failed single-item
//! translation fails the request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comic_ingest::{scrape, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::default();
//!     let output = scrape("https://manga.example/chapter/1", &config).await?;
//!     for url in &output.images {
//!         println!("{url}");
//!     }
//!     eprintln!("skipped: {}", output.stats.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `comic-ingest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], the axum HTTP surface |
//!
//! Disable both when using only the library:
//! ```toml
//! comic-ingest = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod acquire;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use acquire::{scrape, scrape_sync, upload_file, Acquirer};
pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::{CandidateError, FetchError, IngestError, RenderError, StorageError, WorkerError};
pub use output::{AcquisitionMode, AcquisitionOutput, AcquisitionStats, ProcessedArtifact, Provenance};
pub use progress::{AcquisitionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::SessionStore;
