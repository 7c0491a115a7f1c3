//! # Hideaway - static indices with a key-gated secret partition
//!
//! Hideaway publishes a directory of JSON descriptors as static index files
//! for a browser client, while keeping part of the collection discoverable
//! only to clients that can prove they know a shared secret.
//!
//! ## Overview
//!
//! Each build produces two parallel views of the same source tree:
//!
//! - **Public**: `path.json` and `search.json` containing only non-secret
//!   entries, plus one `{leaf}.json` payload per public file
//! - **Full**: `{token}_path.json` and `{token}_search.json` containing every
//!   entry with its secrecy flag, plus secret payloads under `{token}/`
//!
//! `{token}` is an opaque directory name re-derived every build from a fresh
//! timestamp and a server-held key. The timestamp and a derived identifier are
//! published in `update_time.json`; a client holding the secret (or the
//! intermediate value cached after a previous successful check) recomputes the
//! same token locally. Nothing is encrypted: see [`derivation`] for the trust
//! model this relies on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hideaway::{PublisherBuilder, ServerKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = PublisherBuilder::new()
//!     .clean_before_build(true)
//!     .build("./source", "./public/api", ServerKey::new("shared secret")?)?;
//!
//! let report = publisher.publish()?;
//! println!("Secret partition lives under {}", report.token);
//! # Ok(())
//! # }
//! ```
//!
//! ## Verifying on the client side
//!
//! ```rust,no_run
//! use hideaway::{FileSecretCache, SessionContext, SiteReader};
//! use std::sync::Arc;
//!
//! # async fn demo() -> hideaway::Result<()> {
//! let site = SiteReader::new("./public/api");
//! let session = SessionContext::mount(&site, Arc::new(FileSecretCache::new("secret.json"))).await?;
//! let outcome = session.verify_secret("shared secret").await?;
//! assert!(outcome.is_granted());
//! # Ok(())
//! # }
//! ```
//!
//! ## Build pipeline
//!
//! 1. [`epoch::EpochGenerator`] writes the epoch record
//! 2. [`scanner::Scanner`] walks the source tree into enter/leaf/exit events
//! 3. [`tree::TreeBuilder`] reduces the events into one partition's index,
//!    filtering, sorting and pruning as it goes
//! 4. [`writer::ContentWriter`] places each payload under the root matching
//!    its visibility, exactly once
//!
//! [`Publisher`] runs the whole sequence under a build lock;
//! [`watch::SourceWatcher`] reruns it when descriptors change.
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, HideawayError>`. Malformed
//! descriptors are not errors: they are logged and left out of the index.
//!
//! ## Module Organization
//!
//! - [`types`]: descriptors, index nodes, search entries, partitions
//! - [`scanner`]: depth-first event stream over the source tree
//! - [`tree`]: index assembly
//! - [`derivation`]: the keyed-hash chain and trust model
//! - [`epoch`]: epoch record and opaque directory resolution
//! - [`writer`]: payload and index placement
//! - [`publisher`]: build orchestration and configuration
//! - [`watch`]: rebuild on source changes
//! - [`site`]: reading published artifacts
//! - [`cache`]: client-side storage of the cached intermediate
//! - [`verifier`]: client verification state machine
//! - [`error`]: error types

pub mod cache;
pub mod derivation;
pub mod epoch;
pub mod error;
pub mod publisher;
pub mod scanner;
pub mod site;
pub mod tree;
pub mod types;
pub mod verifier;
pub mod watch;
pub mod writer;

mod utils;

pub use cache::{FileSecretCache, MemorySecretCache, SecretCache};
pub use derivation::{DirectoryToken, IntermediateKey};
pub use epoch::{resolve_opaque_directory_name, EpochGenerator, EpochRecord, ServerKey};
pub use error::{HideawayError, Result};
pub use publisher::{BuildContext, BuildMode, PassReport, PublishReport, Publisher, PublisherBuilder};
pub use site::SiteReader;
pub use types::*;
pub use verifier::{EpochSource, Outcome, SessionContext, VerificationState};
pub use utils::format_bytes;

#[cfg(test)]
mod tests;
