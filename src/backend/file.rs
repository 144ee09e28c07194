//! Filesystem Backend
//!
//! Stores each type as a directory under a root path and each entry as a file
//! holding the JSON-encoded payload: `<root>/<type>/<id>`.
//!
//! Type and id are percent-encoded into file names so arbitrary strings cannot
//! escape the root. A leading `.` is always encoded, which keeps dot-files free
//! for in-flight temporary writes. Writes go to a temporary file first and are
//! renamed into place, so readers never observe a partially written entry.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::Backend;
use crate::cache::Payload;
use crate::config::BackendKind;
use crate::error::Result;

/// Distinguishes concurrent temporary files written by this process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

// == File Backend ==
/// Directory-per-type, file-per-entry storage.
#[derive(Debug, Clone)]
pub struct FileBackend {
    /// Absolute root directory
    root: PathBuf,
}

impl FileBackend {
    // == Constructor ==
    /// Creates a backend rooted at `root`. Directories are created on first store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory under which all types are stored.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn type_dir(&self, type_: &str) -> std::io::Result<PathBuf> {
        Ok(self.root.join(encode_name(type_)?))
    }

    fn entry_path(&self, type_: &str, id: &str) -> std::io::Result<PathBuf> {
        Ok(self.type_dir(type_)?.join(encode_name(id)?))
    }

    // == Entries ==
    /// Reads every entry of a type directory as `(id, payload)` pairs.
    async fn entries(&self, type_: &str) -> Result<Vec<(String, Payload)>> {
        let dir = self.type_dir(type_)?;
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') || !entry.file_type().await?.is_file() {
                continue;
            }
            // Entries removed while listing are skipped
            if let Some(payload) = read_entry(&entry.path()).await? {
                entries.push((decode_name(name), payload));
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn store(&self, type_: &str, id: &str, payload: Payload) -> Result<Payload> {
        let encoded = serde_json::to_string(&payload)?;
        let dir = self.type_dir(type_)?;
        let file_name = encode_name(id)?;
        fs::create_dir_all(&dir).await?;

        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let written = match fs::write(&temp, encoded).await {
            Ok(()) => fs::rename(&temp, dir.join(&file_name)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // The temp file may be partially written or never renamed
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(payload)
    }

    async fn fetch(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        read_entry(&self.entry_path(type_, id)?).await
    }

    async fn list(&self, type_: &str) -> Result<Vec<Payload>> {
        let entries = self.entries(type_).await?;
        Ok(entries.into_iter().map(|(_, payload)| payload).collect())
    }

    async fn map(&self, type_: &str) -> Result<HashMap<String, Payload>> {
        let entries = self.entries(type_).await?;
        Ok(entries.into_iter().collect())
    }

    async fn remove(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        let path = self.entry_path(type_, id)?;
        let previous = read_entry(&path).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(previous),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(previous),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, type_: &str) -> Result<()> {
        let dir = self.type_dir(type_)?;
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = reader.next_entry().await? {
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        match fs::remove_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(dir = %dir.display(), removed, "Cleared type directory");
        Ok(())
    }
}

// == Utility Functions ==
/// Reads and decodes one entry file, `None` when the file does not exist.
async fn read_entry(path: &Path) -> Result<Option<Payload>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Maps a type or id to a single safe path component.
fn encode_name(name: &str) -> std::io::Result<String> {
    if name.is_empty() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "cache type and id must not be empty",
        ));
    }
    let encoded = urlencoding::encode(name);
    Ok(match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded.into_owned(),
    })
}

/// Recovers the id from a file name written by [`encode_name`].
fn decode_name(name: &str) -> String {
    urlencoding::decode(name)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| name.to_string())
}
