//! Remote image retrieval: stream one URL to a local file.
//!
//! The body goes to a hidden `.part` file beside the destination and is
//! renamed into place only after the last byte is written. The partial file is
//! a [`tempfile::TempPath`], so every early return (HTTP error, disk error,
//! the timeout dropping the future) deletes it and a failed fetch never leaves
//! anything at the destination.

use crate::config::IngestConfig;
use crate::error::{FetchError, IngestError};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Bytes kept from the start of the body for format sniffing.
const SNIFF_LEN: usize = 32;

/// Retrieves a remote image into local storage.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url` to `destination`, returning the number of bytes written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;
}

/// [`ImageFetcher`] over `reqwest` with a hard end-to-end bound.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    verify_format: bool,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, verify_format: bool) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout,
            verify_format,
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        Self::new(
            Duration::from_secs(config.fetch_timeout_secs),
            config.verify_image_format,
        )
    }

    async fn fetch_inner(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        let partial = tempfile::Builder::new()
            .prefix(".fetch-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(io_error)?
            .into_temp_path();

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&partial)
            .await
            .map_err(io_error)?;

        let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.classify(url, e))?;
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;
        drop(file);

        if self.verify_format && image::guess_format(&head).is_err() {
            warn!("Rejecting non-image payload from {}", url);
            return Err(FetchError::NotAnImage {
                url: url.to_string(),
            });
        }

        partial
            .persist(destination)
            .map_err(|e| io_error(e.error))?;

        debug!("Fetched {} ({} bytes) → {}", url, written, destination.display());
        Ok(written)
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        // The client timeout already covers the request; this also bounds a
        // slow disk and guarantees the partial file is dropped on expiry.
        match tokio::time::timeout(self.timeout, self.fetch_inner(url, destination)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

fn io_error(e: std::io::Error) -> FetchError {
    FetchError::Io {
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_uses_fetch_timeout() {
        let config = IngestConfig::builder().fetch_timeout_secs(7).build().unwrap();
        let fetcher = HttpImageFetcher::from_config(&config).unwrap();
        assert_eq!(fetcher.timeout, Duration::from_secs(7));
        assert!(fetcher.verify_format);
    }

    #[test]
    fn sniffing_recognises_common_formats() {
        assert!(image::guess_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]).is_ok());
        assert!(image::guess_format(b"\x89PNG\r\n\x1a\n").is_ok());
        assert!(image::guess_format(b"<!DOCTYPE html>").is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_or_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("page_0.jpg");
        let fetcher = HttpImageFetcher::new(Duration::from_secs(2), true).unwrap();
        // Port 9 (discard) on loopback is closed on any sane test host.
        let err = fetcher
            .fetch("http://127.0.0.1:9/p.jpg", &dest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport { .. } | FetchError::Timeout { .. }
        ));
        assert!(!dest.exists());
    }
}
