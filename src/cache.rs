//! Client-side storage for the cached intermediate key
//!
//! A verified client keeps exactly one value: the intermediate derived from
//! the secret for the current epoch, with an expiry measured in days. The raw
//! secret is never handed to a cache. [`SecretCache`] is the get/set seam;
//! [`FileSecretCache`] persists to a small JSON file for the CLI and
//! [`MemorySecretCache`] serves tests and embedders that keep state elsewhere.

use crate::error::Result;
use crate::utils;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default lifetime of a cached value
pub const DEFAULT_EXPIRY_DAYS: u32 = 7;

/// Storage for the single cached intermediate value
pub trait SecretCache: Send + Sync {
    /// Current value, if present and not expired
    fn get(&self) -> Option<String>;

    /// Store `value`, valid for `days` from now
    fn set(&self, value: &str, days: u32) -> Result<()>;

    /// Drop the stored value
    fn clear(&self) -> Result<()>;
}

/// A value with its expiry instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedValue {
    /// The cached intermediate
    pub value: String,
    /// When the value stops being returned
    pub expires_at: DateTime<Utc>,
}

impl CachedValue {
    fn new(value: &str, days: u32) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::days(i64::from(days)),
        }
    }

    /// Whether the value is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemorySecretCache {
    slot: Mutex<Option<CachedValue>>,
}

impl MemorySecretCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-populated with an already expired or live entry
    pub fn with_entry(entry: CachedValue) -> Self {
        Self {
            slot: Mutex::new(Some(entry)),
        }
    }

    /// Raw stored entry, ignoring expiry
    pub fn entry(&self) -> Option<CachedValue> {
        self.slot.lock().clone()
    }
}

impl SecretCache for MemorySecretCache {
    fn get(&self) -> Option<String> {
        let slot = self.slot.lock();
        slot.as_ref()
            .filter(|entry| !entry.is_expired_at(Utc::now()))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, value: &str, days: u32) -> Result<()> {
        *self.slot.lock() = Some(CachedValue::new(value, days));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Cache persisted as JSON at a fixed path
#[derive(Debug, Clone)]
pub struct FileSecretCache {
    path: PathBuf,
}

impl FileSecretCache {
    /// Cache stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file location
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SecretCache for FileSecretCache {
    fn get(&self) -> Option<String> {
        if !self.path.exists() {
            return None;
        }
        match utils::read_json::<CachedValue>(&self.path) {
            Ok(entry) if !entry.is_expired_at(Utc::now()) => Some(entry.value),
            Ok(_) => {
                debug!("Cached secret at {:?} has expired", self.path);
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable secret cache {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn set(&self, value: &str, days: u32) -> Result<()> {
        utils::write_json(&self.path, &CachedValue::new(value, days))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
