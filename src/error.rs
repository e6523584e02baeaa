//! Error types for the comic-ingest library.
//!
//! Two tiers of error reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the request cannot produce any result at all
//!   (session storage unavailable, page never rendered, the single upload or
//!   screenshot could not be translated). Returned as `Err(IngestError)` from
//!   the [`crate::acquire`] entry points.
//!
//! * [`CandidateError`] — **Non-fatal**: one discovered image failed to fetch
//!   or translate while the rest of the batch carried on. Stored in
//!   [`crate::output::AcquisitionOutput::failures`] so callers can see what
//!   was skipped without losing the successful pages.
//!
//! The component errors ([`StorageError`], [`FetchError`], [`RenderError`],
//! [`WorkerError`]) are what the individual pipeline stages return; the
//! orchestrator decides which tier each one lands in.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Request-level failures. A request either yields an
/// [`crate::output::AcquisitionOutput`] or exactly one of these.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The caller supplied something that is not an absolute HTTP(S) URL or
    /// not a readable file.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// Session or upload storage could not be allocated or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The page could not be rendered, so no candidates exist.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The only unit of work (upload or screenshot) failed to translate.
    #[error("Translation failed: {0}")]
    Worker(#[from] WorkerError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// A message safe to hand to a remote caller: no filesystem paths and no
    /// internal endpoint addresses.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::InvalidInput { reason, .. } => reason.clone(),
            IngestError::Storage(_) => "session storage is unavailable".to_string(),
            IngestError::Render(e) => e.public_message(),
            IngestError::Worker(e) => e.public_message(),
            IngestError::InvalidConfig(_) | IngestError::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }
}

/// Session storage could not be created or written.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cannot create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to retrieve one remote image.
///
/// Any `Err` means no file was produced at the destination.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum FetchError {
    /// The whole request (connect + headers + body) exceeded the bound.
    #[error("Fetching '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("Fetching '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Writing the body to local storage failed.
    #[error("Writing fetched image to disk failed: {detail}")]
    Io { detail: String },

    /// Connection-level failure (DNS, TLS, reset) that is not a timeout.
    #[error("Fetching '{url}' failed: {detail}")]
    Transport { url: String, detail: String },

    /// The payload does not start with a known image signature.
    #[error("Payload from '{url}' is not a recognised image")]
    NotAnImage { url: String },
}

/// Failure to render a page or extract candidates from it.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RenderError {
    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Navigation failed or the page never settled within the bound.
    #[error("Navigation to '{url}' failed: {detail}")]
    Navigation { url: String, detail: String },

    /// The DOM query for images failed.
    #[error("Image extraction failed: {0}")]
    Extraction(String),

    /// The viewport screenshot could not be captured or saved.
    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),
}

impl RenderError {
    fn public_message(&self) -> String {
        match self {
            RenderError::Launch(_) => "headless browser unavailable".to_string(),
            RenderError::Navigation { url, detail } => {
                format!("could not load '{url}': {detail}")
            }
            RenderError::Extraction(_) => "could not read images from the page".to_string(),
            RenderError::Screenshot(_) => "could not capture the page".to_string(),
        }
    }
}

/// Failure reported by (or while reaching) the translation worker.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker endpoint could not be reached or the connection dropped.
    #[error("Worker unreachable: {detail}")]
    Transport { detail: String },

    /// The worker answered with a non-2xx status.
    #[error("Worker rejected the job with HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// The optional per-call bound elapsed.
    #[error("Worker did not answer within {secs}s")]
    Timeout { secs: u64 },
}

impl WorkerError {
    fn public_message(&self) -> String {
        match self {
            WorkerError::Transport { .. } => "translation worker unreachable".to_string(),
            WorkerError::Rejected { status, .. } => {
                format!("translation worker failed (HTTP {status})")
            }
            WorkerError::Timeout { secs } => {
                format!("translation worker timed out after {secs}s")
            }
        }
    }
}

/// A non-fatal error for one batch candidate.
///
/// The batch continues; the candidate's slot is simply absent from the
/// output URL list.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CandidateError {
    #[error("Candidate {ordinal}: {source}")]
    Fetch { ordinal: usize, source: FetchError },

    #[error("Candidate {ordinal}: {source}")]
    Translate { ordinal: usize, source: WorkerError },
}

impl CandidateError {
    /// Ordinal of the skipped candidate.
    pub fn ordinal(&self) -> usize {
        match self {
            CandidateError::Fetch { ordinal, .. } | CandidateError::Translate { ordinal, .. } => {
                *ordinal
            }
        }
    }
}
