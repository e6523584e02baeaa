//! Progress-callback trait for per-candidate acquisition events.
//!
//! Inject an [`Arc<dyn AcquisitionProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive events
//! as the orchestrator works through a batch. The CLI drives its progress bar
//! from these; library callers can forward them to a channel, a websocket or a
//! log without the pipeline knowing.
//!
//! # Example
//!
//! ```rust
//! use comic_ingest::{AcquisitionProgressCallback, IngestConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     translated: AtomicUsize,
//! }
//!
//! impl AcquisitionProgressCallback for CountingCallback {
//!     fn on_candidate_complete(&self, ordinal: usize, total: usize, url: &str) {
//!         self.translated.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("candidate {}/{} → {}", ordinal + 1, total, url);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { translated: AtomicUsize::new(0) });
//! let config = IngestConfig::builder()
//!     .progress_callback(cb as Arc<dyn AcquisitionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each candidate.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` candidate
/// events may arrive from several tasks at once. All methods default to
/// no-ops.
pub trait AcquisitionProgressCallback: Send + Sync {
    /// Called once the candidate list is known (after rendering, or
    /// immediately for an upload).
    fn on_acquisition_start(&self, total_candidates: usize) {
        let _ = total_candidates;
    }

    /// Called just before a candidate is fetched.
    ///
    /// `ordinal` is 0-based.
    fn on_candidate_start(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when a candidate's translated output is available.
    fn on_candidate_complete(&self, ordinal: usize, total: usize, url: &str) {
        let _ = (ordinal, total, url);
    }

    /// Called when a candidate was skipped.
    fn on_candidate_error(&self, ordinal: usize, total: usize, error: &str) {
        let _ = (ordinal, total, error);
    }

    /// Called once after every candidate has been attempted.
    fn on_acquisition_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// No-op implementation; the default when nothing is configured.
pub struct NoopProgressCallback;

impl AcquisitionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn AcquisitionProgressCallback>;
