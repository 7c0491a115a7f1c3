//! Epoch record generation and opaque directory resolution
//!
//! Each build starts by capturing the current instant and deriving an epoch id
//! from it and the server key (see [`crate::derivation`]). The pair is written
//! to `update_time.json` and is the only root of trust for that build: the
//! writer and any later resolver recompute the opaque directory name from the
//! persisted record instead of caching it.
//!
//! ```rust,no_run
//! use hideaway::epoch::{EpochGenerator, ServerKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = ServerKey::new("correct horse battery staple")?;
//! let generator = EpochGenerator::new("./dist/api");
//! let record = generator.generate(&key)?;
//!
//! // Any later call with the same record and key yields the same name
//! let dir = generator.resolve(&key)?;
//! assert_eq!(dir, hideaway::epoch::resolve_opaque_directory_name(&record, &key));
//! # Ok(())
//! # }
//! ```

use crate::derivation::{DirectoryToken, IntermediateKey};
use crate::error::{HideawayError, Result};
use crate::utils;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the persisted epoch record
pub const EPOCH_FILE_NAME: &str = "update_time.json";

/// The per-build timestamp and identifier pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochRecord {
    /// Identifier derived from the timestamp and the server key
    pub update_id: String,
    /// Build instant in milliseconds since the Unix epoch
    pub update_time: i64,
}

impl EpochRecord {
    /// Derive a record for `timestamp_ms` under `key`
    pub fn derive(timestamp_ms: i64, key: &ServerKey) -> Self {
        let intermediate = IntermediateKey::derive(key.expose(), timestamp_ms);
        Self {
            update_id: intermediate.epoch_id(timestamp_ms),
            update_time: timestamp_ms,
        }
    }

    /// Build instant as a UTC datetime, if representable
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.update_time).single()
    }
}

/// Server-held secret the whole secret partition hangs on
///
/// Never serialized; `Debug` prints a placeholder.
#[derive(Clone)]
pub struct ServerKey(String);

impl ServerKey {
    /// Wrap a key, rejecting empty or whitespace-only values
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(HideawayError::config("server key must not be empty"));
        }
        Ok(Self(key))
    }

    /// Raw key material, for derivation only
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerKey(<redacted>)")
    }
}

/// Recompute the opaque directory name for `record` under `key`
///
/// Pure: identical inputs always give an identical token.
pub fn resolve_opaque_directory_name(record: &EpochRecord, key: &ServerKey) -> DirectoryToken {
    IntermediateKey::derive(key.expose(), record.update_time).directory_token(&record.update_id)
}

/// Creates and reads the epoch record under one output root
#[derive(Debug, Clone)]
pub struct EpochGenerator {
    output_root: PathBuf,
}

impl EpochGenerator {
    /// Generator writing into `output_root`
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Location of the record file
    pub fn record_path(&self) -> PathBuf {
        self.output_root.join(EPOCH_FILE_NAME)
    }

    /// Start a new epoch at the current instant and persist it
    pub fn generate(&self, key: &ServerKey) -> Result<EpochRecord> {
        self.generate_at(Utc::now().timestamp_millis(), key)
    }

    /// Start a new epoch at a given instant and persist it
    pub fn generate_at(&self, timestamp_ms: i64, key: &ServerKey) -> Result<EpochRecord> {
        let record = EpochRecord::derive(timestamp_ms, key);
        utils::write_json(&self.record_path(), &record)?;
        info!("New epoch at {} ({})", record.update_time, &record.update_id[..8]);
        Ok(record)
    }

    /// Read the persisted record
    ///
    /// # Errors
    ///
    /// [`HideawayError::EpochRecordUnavailable`] if the file is missing or
    /// does not decode. Nothing secret can be placed without it.
    pub fn load(&self) -> Result<EpochRecord> {
        load_record(&self.record_path())
    }

    /// Resolve the current opaque directory name from the persisted record
    pub fn resolve(&self, key: &ServerKey) -> Result<DirectoryToken> {
        let record = self.load()?;
        let token = resolve_opaque_directory_name(&record, key);
        debug!("Resolved opaque directory for epoch {}", record.update_time);
        Ok(token)
    }
}

pub(crate) fn load_record(path: &Path) -> Result<EpochRecord> {
    let unavailable = |reason: String| HideawayError::EpochRecordUnavailable {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| unavailable(e.to_string()))
}
