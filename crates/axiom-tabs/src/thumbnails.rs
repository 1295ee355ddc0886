//! On-disk screenshots of frozen tabs
//!
//! File I/O runs on the blocking pool so callers never hold the tab table
//! lock across disk access.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

use crate::view::ViewId;

const PICTURE_SUFFIX: &str = "_pic.save";

#[derive(Debug, Clone)]
pub struct ThumbnailDir {
    root: PathBuf,
}

impl ThumbnailDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable per-view screenshot path: `<root>/<digest>_pic.save`.
    pub fn picture_path(&self, tab_id: &str, view: ViewId) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(tab_id.as_bytes());
        hasher.update(view.to_le_bytes());
        let digest = hasher.finalize();

        let hex: String = digest[..12].iter().map(|b| format!("{b:02x}")).collect();
        self.root.join(format!("{hex}{PICTURE_SUFFIX}"))
    }

    pub async fn write(&self, path: PathBuf, bytes: Vec<u8>) -> io::Result<()> {
        let root = self.root.clone();
        run_blocking(move || {
            std::fs::create_dir_all(&root)?;
            std::fs::write(&path, bytes)
        })
        .await
    }

    pub async fn read(&self, path: PathBuf) -> io::Result<Vec<u8>> {
        run_blocking(move || std::fs::read(&path)).await
    }

    /// Remove a screenshot. A file that is already gone is not an error.
    pub async fn remove(&self, path: PathBuf) -> io::Result<()> {
        run_blocking(move || match std::fs::remove_file(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}
