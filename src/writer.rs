//! Content partitioning and artifact writing
//!
//! The writer places every file-kind leaf payload under exactly one root:
//!
//! | Leaf | Public pass | Full pass |
//! |---|---|---|
//! | non-secret file | `{leaf}.json` | skipped (already written) |
//! | secret file | never admitted | `{token}/{leaf}.json` |
//! | url | nothing | nothing |
//!
//! Payloads are the authored descriptor bytes, written verbatim.
//!
//! It also writes the index artifacts for each pass. The opaque directory is
//! resolved from the persisted epoch record on every secret write; the writer
//! never holds on to a token between calls.
//!
//! Stale `{token}/` directories from earlier epochs are left alone. Clear the
//! output root before building if they must not linger
//! (see [`PublisherBuilder::clean_before_build`](crate::PublisherBuilder::clean_before_build)).

use crate::derivation::DirectoryToken;
use crate::epoch::{EpochGenerator, ServerKey, EPOCH_FILE_NAME};
use crate::error::Result;
use crate::tree::{AcceptedLeaf, IndexOutput};
use crate::types::{DescriptorKind, Partition};
use crate::utils;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Public tree index file name
pub const PATH_INDEX: &str = "path.json";
/// Public search index file name
pub const SEARCH_INDEX: &str = "search.json";

/// Root-level names a public payload must never take
const RESERVED_NAMES: &[&str] = &[PATH_INDEX, SEARCH_INDEX, EPOCH_FILE_NAME];

/// Writes payloads and index files under one output root
#[derive(Debug, Clone)]
pub struct ContentWriter {
    output_root: PathBuf,
    epoch: EpochGenerator,
    key: ServerKey,
}

impl ContentWriter {
    /// Writer for `output_root`, resolving secret placement with `key`
    pub fn new(output_root: impl Into<PathBuf>, key: ServerKey) -> Self {
        let output_root = output_root.into();
        Self {
            epoch: EpochGenerator::new(&output_root),
            output_root,
            key,
        }
    }

    /// Output root this writer targets
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Write the payload for an admitted leaf, if this pass owns it
    ///
    /// Returns the path written, or `None` when the leaf has no payload or
    /// belongs to the other pass.
    pub fn write_leaf(&self, partition: Partition, leaf: &AcceptedLeaf) -> Result<Option<PathBuf>> {
        if leaf.descriptor.kind() == DescriptorKind::Url {
            return Ok(None);
        }

        let target = match (partition, leaf.descriptor.is_secret) {
            (Partition::Public, false) => {
                if RESERVED_NAMES.contains(&leaf.file_name.as_str()) {
                    warn!("Not writing payload {:?}: name is reserved for an index file", leaf.file_name);
                    return Ok(None);
                }
                self.output_root.join(&leaf.file_name)
            }
            (Partition::Full, true) => {
                let token = self.epoch.resolve(&self.key)?;
                self.output_root.join(token.as_str()).join(&leaf.file_name)
            }
            _ => return Ok(None),
        };

        utils::atomic_write(&target, &leaf.descriptor.payload()?)?;
        debug!("Wrote payload {:?}", target);
        Ok(Some(target))
    }

    /// Make sure the opaque directory for the current epoch exists
    pub fn prepare_secret_dir(&self) -> Result<DirectoryToken> {
        let token = self.epoch.resolve(&self.key)?;
        utils::ensure_dir(&self.output_root.join(token.as_str()))?;
        Ok(token)
    }

    /// Write `path.json` and `search.json`
    pub fn write_public_index(&self, index: &IndexOutput) -> Result<()> {
        utils::write_json(&self.output_root.join(PATH_INDEX), &index.tree)?;
        utils::write_json(&self.output_root.join(SEARCH_INDEX), &index.search)?;
        debug!("Public index written ({} search entries)", index.search.len());
        Ok(())
    }

    /// Write `{token}_path.json` and `{token}_search.json`
    pub fn write_full_index(&self, index: &IndexOutput) -> Result<DirectoryToken> {
        let token = self.epoch.resolve(&self.key)?;
        utils::write_json(&self.output_root.join(token.path_index()), &index.tree)?;
        utils::write_json(&self.output_root.join(token.search_index()), &index.search)?;
        debug!("Full index written ({} search entries)", index.search.len());
        Ok(token)
    }
}
