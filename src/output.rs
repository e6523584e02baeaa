//! Result types returned by the acquisition entry points.

use crate::error::CandidateError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a candidate image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Found as an `<img>` on a rendered page.
    Discovered,
    /// Supplied directly by the caller.
    Uploaded,
    /// Viewport capture taken because discovery found nothing.
    Screenshot,
}

/// A prospective source image, before it is fetched or translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Remote URL (discovered) or local path (uploaded, screenshot).
    pub source: String,
    /// Position in discovery order; 0 for single-item requests.
    pub ordinal: usize,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn discovered(source: impl Into<String>, ordinal: usize) -> Self {
        Self {
            source: source.into(),
            ordinal,
            provenance: Provenance::Discovered,
        }
    }
}

/// One translated image on disk and the URL it is served under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedArtifact {
    pub ordinal: usize,
    pub provenance: Provenance,
    pub output_path: PathBuf,
    pub url: String,
}

/// Which branch of the pipeline produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    Upload,
    Screenshot,
    Batch,
}

/// Counters and timings for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub mode: AcquisitionMode,
    /// Qualifying images found on the page, before the cap.
    pub discovered: usize,
    /// Candidates actually sent down the pipeline.
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A completed request: zero or more translated images.
///
/// An empty `images` list is a valid outcome ("ran to completion, nothing
/// usable"); request-level failures are reported as
/// [`crate::error::IngestError`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionOutput {
    /// Session identifier; `None` for uploads, which live in the uploads root.
    pub session_id: Option<String>,
    /// Public URLs of the translated images, in discovery order.
    pub images: Vec<String>,
    pub artifacts: Vec<ProcessedArtifact>,
    /// Candidates that were skipped, with the reason.
    pub failures: Vec<CandidateError>,
    pub stats: AcquisitionStats,
}

impl AcquisitionOutput {
    /// True when at least one candidate was skipped.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
