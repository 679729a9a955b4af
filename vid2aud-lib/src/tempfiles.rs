//! Scratch-file management for one conversion
//!
//! Every conversion owns exactly two scratch paths: the staged input copy and
//! the output artifact. Both are removed when their handles drop, on the
//! success path and on every failure path alike. Removal failures are logged
//! and never escalated.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Owns one scratch path for the lifetime of a conversion.
///
/// The file (if it exists) is deleted on drop. A handle whose path was only
/// reserved and never written drops without touching the filesystem.
#[derive(Debug)]
pub struct TempFileHandle {
    path: PathBuf,
}

impl TempFileHandle {
    /// The owned path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileHandle {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}

/// Allocates scratch storage under a single directory.
#[derive(Debug, Clone)]
pub struct TempFileArena {
    dir: PathBuf,
}

impl Default for TempFileArena {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
        }
    }
}

impl TempFileArena {
    /// Arena rooted at the system temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena rooted at a specific directory. Used by tests to assert that no
    /// files remain after a conversion.
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn unique_path(&self, prefix: &str, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{}", prefix, uuid::Uuid::new_v4(), extension))
    }

    /// Copy the uploaded source content into a scratch file.
    pub fn stage_input(&self, content: &[u8], extension: &str) -> Result<TempFileHandle> {
        let path = self.unique_path("video", extension);
        let mut file = fs::File::create(&path)?;
        // Hold the handle from here on so a partial write is still cleaned up
        let handle = TempFileHandle { path };
        file.write_all(content)?;
        file.flush()?;
        tracing::debug!(
            path = %handle.path.display(),
            bytes = content.len(),
            "staged input copy"
        );
        Ok(handle)
    }

    /// Reserve a path for the output artifact without creating the file; the
    /// encoder creates it when it opens the output container.
    pub fn reserve_output(&self, extension: &str) -> TempFileHandle {
        let handle = TempFileHandle {
            path: self.unique_path("audio", extension),
        };
        tracing::debug!(path = %handle.path.display(), "reserved output path");
        handle
    }
}
