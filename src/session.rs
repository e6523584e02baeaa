//! Session-scoped file layout under the uploads root.
//!
//! ```text
//! uploads/
//!  ├─ 1718000000123.png            uploaded original
//!  ├─ trans_1718000000123.png      its translation
//!  └─ 1718000000456/               one scrape session
//!      ├─ page_0.jpg   trans_0.jpg
//!      ├─ page_1.jpg   trans_1.jpg
//!      └─ …            (or page_screenshot.jpg / trans_screenshot.jpg)
//! ```
//!
//! Every file a request produces lives under a name derived from its session
//! identifier, so concurrent requests never share a path and need no locking.
//! Session directories are never removed here; retention is left to whoever
//! operates the uploads root.

use crate::error::StorageError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Input name of the fallback screenshot inside a session.
pub const SCREENSHOT_INPUT: &str = "page_screenshot.jpg";
/// Output name of the translated screenshot inside a session.
pub const SCREENSHOT_OUTPUT: &str = "trans_screenshot.jpg";
/// Prefix the worker output gets, both for uploads and session pages.
pub const OUTPUT_PREFIX: &str = "trans_";

/// Highest identifier handed out so far, process-wide.
static LAST_ID: AtomicU64 = AtomicU64::new(0);

static SAFE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,8}$").unwrap());

/// Millisecond timestamp, bumped past the last value issued so two calls in
/// the same millisecond still differ.
fn next_id() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut prev = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(prev + 1);
        match LAST_ID.compare_exchange_weak(prev, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => prev = actual,
        }
    }
}

/// Local input name for batch candidate `ordinal`.
pub fn page_file(ordinal: usize) -> String {
    format!("page_{ordinal}.jpg")
}

/// Worker output name for batch candidate `ordinal`.
pub fn trans_file(ordinal: usize) -> String {
    format!("{OUTPUT_PREFIX}{ordinal}.jpg")
}

/// Worker output name for an uploaded file.
pub fn upload_output_name(filename: &str) -> String {
    format!("{OUTPUT_PREFIX}{filename}")
}

/// One scrape request's storage scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    dir: PathBuf,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Allocates sessions and derives their paths and public URLs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    public_base: String,
}

impl SessionStore {
    /// `root` is made absolute against the current directory so every path
    /// handed to the worker is absolute.
    pub fn new(root: impl AsRef<Path>, public_base: impl Into<String>) -> Self {
        let root = root.as_ref();
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the uploads root if it does not exist. Safe to call repeatedly.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.root.clone(),
                source,
            })?;
        info!("Uploads root ready: {}", self.root.display());
        Ok(())
    }

    /// Allocate a fresh session and create its directory.
    pub async fn create_session(&self) -> Result<Session, StorageError> {
        let id = next_id().to_string();
        let dir = self.root.join(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        debug!("Session {} → {}", id, dir.display());
        Ok(Session { id, dir })
    }

    pub fn resolve_path(&self, session: &Session, filename: &str) -> PathBuf {
        session.dir.join(filename)
    }

    pub fn public_url(&self, session: &Session, filename: &str) -> String {
        format!("{}/uploads/{}/{}", self.public_base, session.id, filename)
    }

    // ── Uploads ──────────────────────────────────────────────────────────

    /// Store uploaded bytes directly under the root as `<id><ext>`.
    ///
    /// The extension of `original_name` is kept only when it is a short
    /// alphanumeric suffix; anything else is dropped.
    pub async fn store_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.root.join(upload_name(next_id(), original_name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;
        debug!("Stored upload ({} bytes) at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Copy an existing local file into the root under the upload naming.
    pub async fn adopt_upload(&self, source: &Path) -> Result<PathBuf, StorageError> {
        let original = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = self.root.join(upload_name(next_id(), &original));
        tokio::fs::copy(source, &path)
            .await
            .map_err(|source_err| StorageError::Read {
                path: source.to_path_buf(),
                source: source_err,
            })?;
        Ok(path)
    }

    /// `trans_<filename>` beside the upload, in the uploads root.
    pub fn upload_output_path(&self, filename: &str) -> PathBuf {
        self.root.join(upload_output_name(filename))
    }

    pub fn upload_url(&self, filename: &str) -> String {
        format!("{}/uploads/{}", self.public_base, filename)
    }
}

fn upload_name(id: u64, original_name: &str) -> String {
    match Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| SAFE_EXTENSION.is_match(e))
    {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids: Vec<u64> = (0..1000).map(|_| next_id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..200).map(|_| next_id()).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(page_file(0), "page_0.jpg");
        assert_eq!(trans_file(4), "trans_4.jpg");
        assert_eq!(upload_output_name("1700000000000.png"), "trans_1700000000000.png");
    }

    #[test]
    fn upload_name_keeps_safe_extension_only() {
        assert_eq!(upload_name(42, "chapter1.png"), "42.png");
        assert_eq!(upload_name(42, "scan.JPEG"), "42.JPEG");
        assert_eq!(upload_name(42, "noext"), "42");
        assert_eq!(upload_name(42, "evil.png/../../x"), "42");
        assert_eq!(upload_name(42, "weird.p g"), "42");
    }

    #[test]
    fn public_urls_are_session_scoped() {
        let store = SessionStore::new("/srv/uploads", "http://localhost:5000/");
        let session = Session {
            id: "1700000000000".into(),
            dir: PathBuf::from("/srv/uploads/1700000000000"),
        };
        assert_eq!(
            store.public_url(&session, "trans_3.jpg"),
            "http://localhost:5000/uploads/1700000000000/trans_3.jpg"
        );
        assert_eq!(
            store.resolve_path(&session, "page_3.jpg"),
            PathBuf::from("/srv/uploads/1700000000000/page_3.jpg")
        );
        assert_eq!(
            store.upload_url("trans_5.png"),
            "http://localhost:5000/uploads/trans_5.png"
        );
    }

    #[tokio::test]
    async fn init_is_idempotent_and_sessions_are_disjoint() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path().join("uploads"), "http://localhost:5000");
        store.init().await.unwrap();
        store.init().await.unwrap();

        let (a, b) = tokio::join!(store.create_session(), store.create_session());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir() && b.dir().is_dir());
        assert!(a.dir().starts_with(store.root()));
    }

    #[tokio::test]
    async fn create_session_reports_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the root directory should be.
        let blocker = tmp.path().join("uploads");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let store = SessionStore::new(&blocker, "http://localhost:5000");
        let err = store.create_session().await.unwrap_err();
        assert!(matches!(err, StorageError::CreateDir { .. }));
    }

    #[tokio::test]
    async fn store_upload_writes_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path(), "http://localhost:5000");
        let path = store.store_upload("page.webp", b"RIFF0000WEBP").await.unwrap();
        assert_eq!(path.parent(), Some(store.root()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("webp"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF0000WEBP");
    }
}
