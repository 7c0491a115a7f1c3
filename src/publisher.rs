//! Build orchestration
//!
//! The [`Publisher`] runs one complete build:
//!
//! 1. Optionally clear the output root
//! 2. Start a new epoch and persist `update_time.json`
//! 3. Public pass: scan, build the public index, write public payloads
//! 4. Full pass: scan again, build the full index, write secret payloads
//!
//! Step 2 must finish before either pass, since secret placement reads the
//! persisted record. The two passes do not depend on each other.
//!
//! Builds are serialized through a lock shared by every clone of a
//! `Publisher`, so rapid rebuild triggers (the watcher, a manual build in
//! parallel) never interleave writes to the same output root.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use hideaway::{BuildMode, PublisherBuilder, ServerKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = PublisherBuilder::new()
//!     .mode(BuildMode::Production)
//!     .clean_before_build(true)
//!     .build("./source", "./dist/api", ServerKey::new("my key")?)?;
//!
//! let report = publisher.publish()?;
//! println!("{} public entries, {} total", report.public.search_entries, report.full.search_entries);
//! # Ok(())
//! # }
//! ```

use crate::derivation::DirectoryToken;
use crate::epoch::{EpochGenerator, EpochRecord, ServerKey};
use crate::error::{HideawayError, Result};
use crate::scanner::Scanner;
use crate::tree::{build_index, IndexOutput};
use crate::types::{Partition, CONTENT_EXTENSION};
use crate::utils;
use crate::writer::ContentWriter;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Which environment a build targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Output served by a local dev server
    #[default]
    Development,
    /// Output bundled for deployment
    Production,
}

impl BuildMode {
    /// Conventional output root for this mode under a project directory
    pub fn default_output_root(&self, project_root: &Path) -> PathBuf {
        match self {
            BuildMode::Development => project_root.join("public").join("api"),
            BuildMode::Production => project_root.join("dist").join("api"),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}

/// Everything a build needs, passed explicitly instead of held globally
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Directory holding the authored descriptors
    pub source_root: PathBuf,
    /// Directory the static artifacts are written to
    pub output_root: PathBuf,
    /// Server-held key rooting every derivation
    pub server_key: ServerKey,
    /// Target environment
    pub mode: BuildMode,
    /// Remove the output root before building
    pub clean_before_build: bool,
    /// Descriptor file extension, without the dot
    pub extension: String,
}

/// Counts for one partition pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// File entries anywhere in the tree
    pub tree_files: usize,
    /// Entries in the flat search list
    pub search_entries: usize,
    /// Payload files this pass wrote
    pub payloads_written: usize,
}

impl PassReport {
    fn from_index(index: &IndexOutput, payloads_written: usize) -> Self {
        Self {
            tree_files: index.tree.all_files().len(),
            search_entries: index.search.len(),
            payloads_written,
        }
    }
}

/// Summary of a finished build
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Epoch this build created
    pub record: EpochRecord,
    /// Opaque directory holding the secret partition
    pub token: DirectoryToken,
    /// Public pass counts
    pub public: PassReport,
    /// Full pass counts
    pub full: PassReport,
    /// Whether the output root was cleared first
    pub cleaned: bool,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Runs builds for one source/output pair
#[derive(Debug, Clone)]
pub struct Publisher {
    context: BuildContext,
    build_lock: Arc<Mutex<()>>,
}

impl Publisher {
    /// Publisher for an explicit context
    pub fn new(context: BuildContext) -> Self {
        Self {
            context,
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The build context
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run a full build, waiting for any build already in progress
    #[instrument(skip(self), fields(mode = %self.context.mode))]
    pub fn publish(&self) -> Result<PublishReport> {
        let _guard = self.build_lock.lock();
        self.run()
    }

    /// Run a full build unless another one holds the lock
    ///
    /// # Errors
    ///
    /// [`HideawayError::BuildInProgress`] if a build is already running.
    #[instrument(skip(self), fields(mode = %self.context.mode))]
    pub fn try_publish(&self) -> Result<PublishReport> {
        let _guard = self.build_lock.try_lock().ok_or(HideawayError::BuildInProgress)?;
        self.run()
    }

    /// Opaque directory name for the currently persisted epoch
    pub fn resolve_directory(&self) -> Result<DirectoryToken> {
        EpochGenerator::new(&self.context.output_root).resolve(&self.context.server_key)
    }

    fn run(&self) -> Result<PublishReport> {
        let start = Instant::now();
        let ctx = &self.context;
        info!("Publishing {:?} -> {:?}", ctx.source_root, ctx.output_root);

        if !ctx.source_root.is_dir() {
            return Err(HideawayError::SourceNotFound(ctx.source_root.clone()));
        }

        // Links may have changed since the builder checked
        check_disjoint(&ctx.source_root, &ctx.output_root)?;
        let cleaned = ctx.clean_before_build && utils::remove_dir_if_exists(&ctx.output_root)?;
        utils::ensure_dir(&ctx.output_root)?;

        let record = EpochGenerator::new(&ctx.output_root).generate(&ctx.server_key)?;
        let writer = ContentWriter::new(&ctx.output_root, ctx.server_key.clone());
        writer.prepare_secret_dir()?;

        let public = self.pass(&writer, Partition::Public)?;
        let full = self.pass(&writer, Partition::Full)?;

        let token = writer.write_full_index(&full.0)?;
        writer.write_public_index(&public.0)?;

        let report = PublishReport {
            record,
            token,
            public: PassReport::from_index(&public.0, public.1),
            full: PassReport::from_index(&full.0, full.1),
            cleaned,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Published {} public / {} total entries in {}ms",
            report.public.search_entries, report.full.search_entries, report.duration_ms
        );
        Ok(report)
    }

    fn pass(&self, writer: &ContentWriter, partition: Partition) -> Result<(IndexOutput, usize)> {
        let scanner = Scanner::with_extension(&self.context.source_root, &self.context.extension);
        let mut written = 0usize;
        let index = build_index(scanner, partition, |leaf| {
            if writer.write_leaf(partition, leaf)?.is_some() {
                written += 1;
            }
            Ok(())
        })?;
        debug!("{} pass wrote {} payloads", partition, written);
        Ok((index, written))
    }
}

/// Builder for [`Publisher`]
///
/// # Default Values
///
/// - `mode`: `BuildMode::Development`
/// - `clean_before_build`: false
/// - `extension`: `json`
#[derive(Debug, Clone)]
pub struct PublisherBuilder {
    mode: BuildMode,
    clean_before_build: bool,
    extension: String,
}

impl PublisherBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            mode: BuildMode::default(),
            clean_before_build: false,
            extension: CONTENT_EXTENSION.to_string(),
        }
    }

    /// Set the target environment
    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Remove the output root before every build
    ///
    /// Without this, secret directories from earlier epochs stay on disk.
    pub fn clean_before_build(mut self, clean: bool) -> Self {
        self.clean_before_build = clean;
        self
    }

    /// Recognize descriptors by a different extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Build the publisher
    ///
    /// # Errors
    ///
    /// [`HideawayError::InvalidConfiguration`] if the extension is empty or
    /// either root contains the other. Output inside the source would be
    /// scanned as descriptors; source inside the output would be deleted by
    /// a clean build.
    pub fn build(
        self,
        source_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        server_key: ServerKey,
    ) -> Result<Publisher> {
        let source_root = source_root.into();
        let output_root = output_root.into();

        if self.extension.is_empty() {
            return Err(HideawayError::config("descriptor extension must not be empty"));
        }
        check_disjoint(&source_root, &output_root)?;

        Ok(Publisher::new(BuildContext {
            source_root,
            output_root,
            server_key,
            mode: self.mode,
            clean_before_build: self.clean_before_build,
            extension: self.extension,
        }))
    }
}

/// Reject source and output roots that overlap in either direction
///
/// Both roots are compared in resolved form, so `./`, `..` and symlinked
/// spellings of the same location are caught.
fn check_disjoint(source_root: &Path, output_root: &Path) -> Result<()> {
    let source = utils::resolve_path(source_root)?;
    let output = utils::resolve_path(output_root)?;
    if output.starts_with(&source) {
        return Err(HideawayError::config(format!(
            "output root {:?} must not be inside source root {:?}",
            output_root, source_root
        )));
    }
    if source.starts_with(&output) {
        return Err(HideawayError::config(format!(
            "source root {:?} must not be inside output root {:?}",
            source_root, output_root
        )));
    }
    Ok(())
}

impl Default for PublisherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
