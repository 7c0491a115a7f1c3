//! Read access to a published site
//!
//! [`SiteReader`] is the client's view of the static artifacts: the epoch
//! record, the public and full indices, and leaf payloads. It reads from a
//! local directory (a build output or a synced copy of one); anything that can
//! serve the same relative paths could stand in for it.

use crate::derivation::DirectoryToken;
use crate::epoch::{EpochRecord, EPOCH_FILE_NAME};
use crate::error::{HideawayError, Result};
use crate::types::{Descriptor, DescriptorKind, FileDetail, PathTree, SearchEntry};
use crate::verifier::EpochSource;
use crate::writer::{PATH_INDEX, SEARCH_INDEX};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::trace;

/// Reader over a directory of published artifacts
#[derive(Debug, Clone)]
pub struct SiteReader {
    root: PathBuf,
}

impl SiteReader {
    /// Reader rooted at a published output directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read<T: DeserializeOwned>(&self, relative: &str) -> Result<T> {
        let path = self.root.join(relative);
        trace!("GET {}", relative);
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => HideawayError::ArtifactNotFound(relative.to_string()),
            _ => HideawayError::Io(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `update_time.json`
    pub async fn epoch(&self) -> Result<EpochRecord> {
        self.read(EPOCH_FILE_NAME).await
    }

    /// `path.json`
    pub async fn public_tree(&self) -> Result<PathTree> {
        self.read(PATH_INDEX).await
    }

    /// `search.json`
    pub async fn public_search(&self) -> Result<Vec<SearchEntry>> {
        self.read(SEARCH_INDEX).await
    }

    /// `{token}_path.json`
    pub async fn full_tree(&self, token: &DirectoryToken) -> Result<PathTree> {
        self.read(&token.path_index()).await
    }

    /// `{token}_search.json`
    pub async fn full_search(&self, token: &DirectoryToken) -> Result<Vec<SearchEntry>> {
        self.read(&token.search_index()).await
    }

    /// `{leaf}.json`
    pub async fn public_leaf(&self, json_name: &str) -> Result<Descriptor> {
        self.read(json_name).await
    }

    /// `{token}/{leaf}.json`
    pub async fn secret_leaf(&self, json_name: &str, token: &DirectoryToken) -> Result<Descriptor> {
        self.read(&format!("{}/{}", token, json_name)).await
    }

    /// Fetch the payload behind a tree entry, choosing the right location
    ///
    /// # Errors
    ///
    /// - [`HideawayError::AccessDenied`] for a secret entry without a token
    /// - [`HideawayError::ArtifactNotFound`] for url entries, which have no payload
    pub async fn open(&self, entry: &FileDetail, token: Option<&DirectoryToken>) -> Result<Descriptor> {
        if entry.kind == DescriptorKind::Url {
            return Err(HideawayError::ArtifactNotFound(format!(
                "{} is a link to {}",
                entry.name, entry.json_name
            )));
        }
        match (entry.is_secret.unwrap_or(false), token) {
            (false, _) => self.public_leaf(&entry.json_name).await,
            (true, Some(token)) => self.secret_leaf(&entry.json_name, token).await,
            (true, None) => Err(HideawayError::AccessDenied(format!(
                "{} is secret; verify first",
                entry.name
            ))),
        }
    }
}

impl EpochSource for SiteReader {
    fn fetch_epoch(&self) -> impl Future<Output = Result<EpochRecord>> + Send {
        self.epoch()
    }
}
