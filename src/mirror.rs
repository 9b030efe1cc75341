// src/mirror.rs
// =============================================================================
// The local copy of the portal:
//
//   <root>/<term>/<course>/<category>/<page>/<entry>/text.txt
//                                               .../<entry>/<file>
//
// Every run starts from an empty root; nothing is reused between runs.
// Names come straight from the portal's link text, so every path segment
// goes through `sanitize_name` first.
// =============================================================================

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::CrawlError;

/// File an entry's free text is written to
pub const TEXT_FILE_NAME: &str = "text.txt";

// Makes a portal label safe to use as one path segment.
// Spaces become underscores (like the downloaded file names), and so do
// path separators and control characters. "." and ".." can't escape the
// parent directory.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

// A mirror root must not be a filesystem root, the working directory or
// one of its ancestors (`.`, `..`, `sub/..`): wiping it would delete the
// directory we were started from.
fn is_unsafe_root(root: &Path, cwd: &Path) -> bool {
    if root.as_os_str().is_empty() {
        return true;
    }
    let target = normalize(&cwd.join(root));
    target.parent().is_none() || normalize(cwd).starts_with(&target)
}

// Resolves `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deletes the mirror root (if any) and recreates it empty
    pub async fn reset(&self) -> Result<(), CrawlError> {
        let cwd = std::env::current_dir().map_err(|e| CrawlError::storage(&self.root, e))?;
        if is_unsafe_root(&self.root, &cwd) {
            return Err(CrawlError::storage(
                &self.root,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "refusing to use this path as the mirror root",
                ),
            ));
        }

        if fs::try_exists(&self.root).await.unwrap_or(false) {
            fs::remove_dir_all(&self.root)
                .await
                .map_err(|e| CrawlError::storage(&self.root, e))?;
            info!(root = %self.root.display(), "cleared mirror root");
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CrawlError::storage(&self.root, e))
    }

    /// Creates `parent/<sanitized name>` and returns its path
    pub async fn subdir(&self, parent: &Path, name: &str) -> Result<PathBuf, CrawlError> {
        let dir = parent.join(sanitize_name(name));
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CrawlError::storage(&dir, e))?;
        Ok(dir)
    }

    /// Writes an entry's text into `dir/text.txt`. Empty text writes nothing.
    pub async fn write_text(&self, dir: &Path, text: &str) -> Result<Option<PathBuf>, CrawlError> {
        if text.is_empty() {
            return Ok(None);
        }

        let path = dir.join(TEXT_FILE_NAME);
        fs::write(&path, text)
            .await
            .map_err(|e| CrawlError::storage(&path, e))?;
        debug!(path = %path.display(), "saved entry text");
        Ok(Some(path))
    }
}
