//! Identifier derivation and the trust model behind it
//!
//! Every secret-access decision in Hideaway comes from one chain of keyed
//! hashes. The build side and the client side both call the functions in this
//! module, so the two can never drift apart.
//!
//! ## The chain
//!
//! With `t` the epoch timestamp in milliseconds (decimal string) and
//! `HMAC` meaning lowercase-hex HMAC-SHA256:
//!
//! ```text
//! intermediate = HMAC(key = secret,       msg = t)
//! epoch id     = HMAC(key = intermediate, msg = t)
//! dir token    = HMAC(key = intermediate, msg = epoch id)
//! ```
//!
//! The epoch id is published in `update_time.json`. The directory token names
//! the folder holding secret payloads and prefixes the full index files.
//!
//! ## Trust model: obscurity-gated discovery
//!
//! Secret payloads are **not encrypted**. They sit as plain JSON under a
//! directory whose name cannot be guessed without the intermediate, which in
//! turn cannot be computed without the secret. Concretely:
//!
//! - Holding the intermediate for the current epoch is proof of knowing the
//!   secret at build time; the client caches only that, never the secret.
//! - The server key never appears in any published artifact.
//! - Every rebuild picks a new timestamp, so every cached intermediate and
//!   every directory token from an earlier epoch stops working.
//! - Anyone who learns the directory token (a shared link, a proxy log) can
//!   read the secret payloads for that epoch. Transport and hosting must not
//!   list directories.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

fn keyed_hex(key: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// First link of the chain: what a verified client keeps in its cache
#[derive(Clone, PartialEq, Eq)]
pub struct IntermediateKey(String);

impl IntermediateKey {
    /// Derive from the raw secret and the epoch timestamp
    pub fn derive(secret: &str, timestamp_ms: i64) -> Self {
        Self(keyed_hex(secret.as_bytes(), timestamp_ms.to_string().as_bytes()))
    }

    /// Wrap a previously cached value
    pub fn from_cached(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Hex form, suitable for caching
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The epoch id this intermediate produces for `timestamp_ms`
    pub fn epoch_id(&self, timestamp_ms: i64) -> String {
        keyed_hex(self.0.as_bytes(), timestamp_ms.to_string().as_bytes())
    }

    /// The opaque directory token bound to `epoch_id`
    pub fn directory_token(&self, epoch_id: &str) -> DirectoryToken {
        DirectoryToken(keyed_hex(self.0.as_bytes(), epoch_id.as_bytes()))
    }

    /// Check this intermediate against a published epoch
    ///
    /// Returns the directory token when the intermediate reproduces
    /// `epoch_id`, `None` otherwise.
    pub fn unlock(&self, timestamp_ms: i64, epoch_id: &str) -> Option<DirectoryToken> {
        if self.epoch_id(timestamp_ms) == epoch_id {
            Some(self.directory_token(epoch_id))
        } else {
            None
        }
    }
}

impl fmt::Debug for IntermediateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntermediateKey({}…)", self.0.chars().take(8).collect::<String>())
    }
}

/// Opaque directory name gating the secret partition of one epoch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryToken(String);

impl DirectoryToken {
    /// Token as a path segment
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the full tree index for this token
    pub fn path_index(&self) -> String {
        format!("{}_path.json", self.0)
    }

    /// File name of the full search index for this token
    pub fn search_index(&self) -> String {
        format!("{}_search.json", self.0)
    }
}

impl fmt::Display for DirectoryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DirectoryToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
