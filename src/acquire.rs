//! Acquisition entry points: the upload path and the scrape path.
//!
//! ## Scrape states
//!
//! ```text
//! Start ──render──▶ RenderError ───────────────────────────▶ Failed
//!   │
//!   ├─ Screenshot ─▶ SingleItem ──worker ok──▶ Done(1 url)
//!   │                          └─worker err─▶ Failed
//!   │
//!   └─ Discovered ─▶ BatchProcessing (cap, fetch+translate each,
//!                                     skip failures) ─────▶ Done(0..=cap urls)
//! ```
//!
//! `Done` is `Ok(AcquisitionOutput)`, possibly with an empty `images` list;
//! `Failed` is `Err(IngestError)`. Batch candidates never fail the request.

use crate::config::IngestConfig;
use crate::error::{CandidateError, IngestError};
use crate::output::{
    AcquisitionMode, AcquisitionOutput, AcquisitionStats, Candidate, ProcessedArtifact, Provenance,
};
use crate::pipeline::chrome::ChromeLauncher;
use crate::pipeline::fetch::{HttpImageFetcher, ImageFetcher};
use crate::pipeline::render::{PageRenderer, RenderResult, Renderer};
use crate::pipeline::worker::{HttpWorker, TranslationWorker};
use crate::session::{self, Session, SessionStore};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Scrape `url` with a freshly wired [`Acquirer`].
///
/// This is the primary entry point for library users.
///
/// # Errors
/// Returns `Err(IngestError)` only when nothing could be attempted: the URL
/// is not absolute HTTP(S), the session directory could not be created, the
/// page failed to render, or the lone screenshot failed to translate.
pub async fn scrape(
    url: impl AsRef<str>,
    config: &IngestConfig,
) -> Result<AcquisitionOutput, IngestError> {
    let acquirer = Acquirer::new(config.clone())?;
    acquirer.init().await?;
    acquirer.scrape(url.as_ref()).await
}

/// Copy a local image into the uploads root and translate it.
pub async fn upload_file(
    path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<AcquisitionOutput, IngestError> {
    let acquirer = Acquirer::new(config.clone())?;
    acquirer.init().await?;
    let stored = acquirer.store().adopt_upload(path.as_ref()).await?;
    acquirer.upload(&stored).await
}

/// Synchronous wrapper around [`scrape`].
///
/// Creates a temporary tokio runtime internally.
pub fn scrape_sync(
    url: impl AsRef<str>,
    config: &IngestConfig,
) -> Result<AcquisitionOutput, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scrape(url, config))
}

/// Composes the session store, renderer, fetcher and worker.
///
/// Cheap to share behind an `Arc`; every request gets its own session and
/// browser, so concurrent calls on one `Acquirer` do not interfere.
pub struct Acquirer {
    config: IngestConfig,
    store: SessionStore,
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn ImageFetcher>,
    worker: Arc<dyn TranslationWorker>,
}

impl Acquirer {
    /// Production wiring: headless Chrome, `reqwest` fetcher, HTTP worker.
    pub fn new(config: IngestConfig) -> Result<Self, IngestError> {
        let renderer = Arc::new(PageRenderer::new(Arc::new(ChromeLauncher), &config));
        let fetcher = Arc::new(HttpImageFetcher::from_config(&config)?);
        let worker = Arc::new(HttpWorker::from_config(&config)?);
        Ok(Self::with_components(config, renderer, fetcher, worker))
    }

    /// Wire explicit components (alternate browsers, fakes in tests).
    pub fn with_components(
        config: IngestConfig,
        renderer: Arc<dyn Renderer>,
        fetcher: Arc<dyn ImageFetcher>,
        worker: Arc<dyn TranslationWorker>,
    ) -> Self {
        let store = SessionStore::new(&config.uploads_root, config.public_base_url.clone());
        Self {
            config,
            store,
            renderer,
            fetcher,
            worker,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Create the uploads root. Idempotent; call once at startup.
    pub async fn init(&self) -> Result<(), IngestError> {
        self.store.init().await?;
        Ok(())
    }

    // ── Upload path ──────────────────────────────────────────────────────

    /// Store uploaded bytes and translate them.
    pub async fn upload_bytes(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<AcquisitionOutput, IngestError> {
        let stored = self.store.store_upload(original_name, bytes).await?;
        self.upload(&stored).await
    }

    /// Translate one already-stored file to `trans_<filename>` in the
    /// uploads root. Any failure is the request's failure.
    pub async fn upload(&self, input: &Path) -> Result<AcquisitionOutput, IngestError> {
        let start = Instant::now();
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|_| input.is_file())
            .ok_or_else(|| IngestError::InvalidInput {
                input: input.display().to_string(),
                reason: "upload is not a readable file".to_string(),
            })?;
        let input = std::path::absolute(input)
            .map_err(|e| IngestError::Internal(format!("resolve upload path: {e}")))?;

        let output_name = session::upload_output_name(&filename);
        let output_path = self.store.upload_output_path(&filename);
        self.notify_start(1);

        info!("Translating upload {}", filename);
        if let Err(e) = self.worker.translate(&input, &output_path).await {
            warn!("Upload {} failed: {}", filename, e);
            self.notify_complete(1, 0);
            return Err(IngestError::Worker(e));
        }

        let url = self.store.upload_url(&output_name);
        self.notify_complete(1, 1);
        Ok(AcquisitionOutput {
            session_id: None,
            images: vec![url.clone()],
            artifacts: vec![ProcessedArtifact {
                ordinal: 0,
                provenance: Provenance::Uploaded,
                output_path,
                url,
            }],
            failures: Vec::new(),
            stats: AcquisitionStats {
                mode: AcquisitionMode::Upload,
                discovered: 0,
                attempted: 1,
                succeeded: 1,
                skipped: 0,
                render_duration_ms: 0,
                total_duration_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    // ── Scrape path ──────────────────────────────────────────────────────

    /// Render `url`, then translate either the discovered images (capped,
    /// failures skipped) or the single fallback screenshot.
    pub async fn scrape(&self, url: &str) -> Result<AcquisitionOutput, IngestError> {
        let total_start = Instant::now();
        validate_page_url(url)?;

        // ── Start ────────────────────────────────────────────────────────
        let session = self.store.create_session().await?;
        info!("Scrape session {} for {}", session.id(), url);

        let screenshot_path = self.store.resolve_path(&session, session::SCREENSHOT_INPUT);
        let render_start = Instant::now();
        let rendered = self.renderer.render(url, &screenshot_path).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        match rendered {
            // ── SingleItem ───────────────────────────────────────────────
            RenderResult::Screenshot(input) => {
                self.notify_start(1);
                let output_path = self.store.resolve_path(&session, session::SCREENSHOT_OUTPUT);
                if let Err(e) = self.worker.translate(&input, &output_path).await {
                    warn!("Screenshot translation failed: {}", e);
                    self.notify_complete(1, 0);
                    return Err(IngestError::Worker(e));
                }
                let url = self.store.public_url(&session, session::SCREENSHOT_OUTPUT);
                self.notify_complete(1, 1);
                Ok(AcquisitionOutput {
                    session_id: Some(session.id().to_string()),
                    images: vec![url.clone()],
                    artifacts: vec![ProcessedArtifact {
                        ordinal: 0,
                        provenance: Provenance::Screenshot,
                        output_path,
                        url,
                    }],
                    failures: Vec::new(),
                    stats: AcquisitionStats {
                        mode: AcquisitionMode::Screenshot,
                        discovered: 0,
                        attempted: 1,
                        succeeded: 1,
                        skipped: 0,
                        render_duration_ms,
                        total_duration_ms: total_start.elapsed().as_millis() as u64,
                    },
                })
            }

            // ── BatchProcessing ──────────────────────────────────────────
            RenderResult::Discovered(urls) => {
                let discovered = urls.len();
                let candidates = cap_candidates(urls, self.config.max_candidates);
                info!(
                    "Discovered {} images, processing {}",
                    discovered,
                    candidates.len()
                );
                self.notify_start(candidates.len());

                let outcomes = self.run_batch(&session, &candidates).await;
                let (artifacts, failures) = partition_outcomes(outcomes);

                self.notify_complete(candidates.len(), artifacts.len());
                info!(
                    "Session {} done: {}/{} translated",
                    session.id(),
                    artifacts.len(),
                    candidates.len()
                );

                // ── Done ─────────────────────────────────────────────────
                Ok(AcquisitionOutput {
                    session_id: Some(session.id().to_string()),
                    images: artifacts.iter().map(|a| a.url.clone()).collect(),
                    stats: AcquisitionStats {
                        mode: AcquisitionMode::Batch,
                        discovered,
                        attempted: candidates.len(),
                        succeeded: artifacts.len(),
                        skipped: failures.len(),
                        render_duration_ms,
                        total_duration_ms: total_start.elapsed().as_millis() as u64,
                    },
                    artifacts,
                    failures,
                })
            }
        }
    }

    /// Process every candidate, at most `concurrency` at a time, yielding
    /// outcomes in candidate order.
    async fn run_batch(
        &self,
        session: &Session,
        candidates: &[Candidate],
    ) -> Vec<Result<ProcessedArtifact, CandidateError>> {
        let total = candidates.len();
        // Boxed up front so the request future stays `Send` for spawned tasks.
        let jobs: Vec<BoxFuture<'_, Result<ProcessedArtifact, CandidateError>>> = candidates
            .iter()
            .map(|candidate| self.process_candidate(session, candidate, total).boxed())
            .collect();
        stream::iter(jobs)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn process_candidate(
        &self,
        session: &Session,
        candidate: &Candidate,
        total: usize,
    ) -> Result<ProcessedArtifact, CandidateError> {
        let ordinal = candidate.ordinal;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_candidate_start(ordinal, total);
        }

        let result = self.fetch_and_translate(session, candidate).await;

        match &result {
            Ok(artifact) => {
                debug!("Candidate {} → {}", ordinal, artifact.url);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_candidate_complete(ordinal, total, &artifact.url);
                }
            }
            Err(e) => {
                warn!("Skipped page {}: {}", ordinal, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_candidate_error(ordinal, total, &e.to_string());
                }
            }
        }
        result
    }

    async fn fetch_and_translate(
        &self,
        session: &Session,
        candidate: &Candidate,
    ) -> Result<ProcessedArtifact, CandidateError> {
        let ordinal = candidate.ordinal;
        let input = self.store.resolve_path(session, &session::page_file(ordinal));
        let output_name = session::trans_file(ordinal);
        let output_path = self.store.resolve_path(session, &output_name);

        self.fetcher
            .fetch(&candidate.source, &input)
            .await
            .map_err(|source| CandidateError::Fetch { ordinal, source })?;

        self.worker
            .translate(&input, &output_path)
            .await
            .map_err(|source| CandidateError::Translate { ordinal, source })?;

        Ok(ProcessedArtifact {
            ordinal,
            provenance: candidate.provenance,
            output_path,
            url: self.store.public_url(session, &output_name),
        })
    }

    fn notify_start(&self, total: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_acquisition_start(total);
        }
    }

    fn notify_complete(&self, total: usize, succeeded: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_acquisition_complete(total, succeeded);
        }
    }
}

/// Turn discovered URLs into at most `max` ordinal-tagged candidates.
pub fn cap_candidates(urls: Vec<String>, max: usize) -> Vec<Candidate> {
    urls.into_iter()
        .take(max)
        .enumerate()
        .map(|(ordinal, url)| Candidate::discovered(url, ordinal))
        .collect()
}

/// Split per-candidate outcomes into successes and skips, each keeping the
/// original relative order.
pub fn partition_outcomes(
    outcomes: Vec<Result<ProcessedArtifact, CandidateError>>,
) -> (Vec<ProcessedArtifact>, Vec<CandidateError>) {
    outcomes.into_iter().fold(
        (Vec::new(), Vec::new()),
        |(mut ok, mut skipped), outcome| {
            match outcome {
                Ok(artifact) => ok.push(artifact),
                Err(e) => skipped.push(e),
            }
            (ok, skipped)
        },
    )
}

fn validate_page_url(url: &str) -> Result<(), IngestError> {
    let invalid = |reason: &str| IngestError::InvalidInput {
        input: url.to_string(),
        reason: reason.to_string(),
    };
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid("not an absolute URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs can be scraped"));
    }
    Ok(())
}
