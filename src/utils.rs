//! Utility functions for Hideaway
//!
//! File helpers shared by the epoch generator, the content writer and the
//! client secret cache: atomic JSON writes, directory preparation, and byte
//! formatting for reports.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// Write content to a file atomically
///
/// Content goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers see either the old file or the new one.
/// Parent directories are created as needed.
///
/// # Errors
///
/// - [`HideawayError::Io`](crate::HideawayError::Io) if the directory cannot
///   be created or the temporary file cannot be written or persisted
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;

    trace!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Serialize a value as pretty JSON (two-space indent) and write it atomically
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    debug!("Writing {:?}", path);
    atomic_write(path, &json)
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create a directory and its parents if missing
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Resolve a path that may not exist yet to an absolute, symlink-free form
///
/// `.` and `..` are folded first, then the longest existing prefix is
/// canonicalized and the missing remainder appended. Two paths naming the
/// same location resolve equal however they were spelled.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other),
        }
    }

    let mut existing = folded.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(base) = fs::canonicalize(existing) {
            return Ok(missing.iter().rev().fold(base, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(folded),
        }
    }
}

/// Remove a directory tree if it exists
///
/// Returns whether anything was removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_dir_all(path)?;
        debug!("Removed {:?}", path);
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
