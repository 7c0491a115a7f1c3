//! Depth-first content scanner
//!
//! The scanner walks a source directory and turns it into a flat sequence of
//! [`ScanEvent`]s: one `Enter` before a directory's contents, one `Leaf` per
//! descriptor file, one `Exit` after the contents. Assembly of the index tree
//! lives in [`crate::tree`]; the two halves only share the event type, so each
//! can be tested on its own.
//!
//! ## Ordering
//!
//! Entries inside a directory come out in whatever order the filesystem
//! returns them. Nothing here sorts; sibling order is fixed when the tree
//! builder closes a node.
//!
//! ## Malformed descriptors
//!
//! A descriptor file that fails to parse is logged and reported as a
//! `Leaf` with no descriptor. The walk carries on, so a bad file leaves a gap
//! in the index instead of aborting the build.
//!
//! Symbolic links are followed. Link cycles and dangling links are logged and
//! skipped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hideaway::scanner::{Scanner, ScanEvent};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! for event in Scanner::new("./source") {
//!     match event? {
//!         ScanEvent::Enter { name } => println!("> {}", name),
//!         ScanEvent::Leaf { file_name, descriptor } => {
//!             println!("  {} ({})", file_name, descriptor.is_some());
//!         }
//!         ScanEvent::Exit { name, .. } => println!("< {}", name),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{HideawayError, Result};
use crate::types::{Descriptor, CONTENT_EXTENSION};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// A single step of a depth-first walk
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// About to descend into a directory (never emitted for the root)
    Enter {
        /// Last path segment of the directory
        name: String,
    },
    /// A descriptor file; `descriptor` is `None` when it failed to parse
    Leaf {
        /// File name including extension, e.g. `Intro.json`
        file_name: String,
        /// Parsed descriptor, if parsing succeeded
        descriptor: Option<Descriptor>,
    },
    /// All contents of a directory have been emitted
    Exit {
        /// Last path segment of the directory
        name: String,
        /// Set only on the final event of the walk
        is_root: bool,
    },
}

/// Iterator over the [`ScanEvent`]s of a source tree
///
/// Built on `walkdir` in its default pre-order mode; exit events are
/// synthesized from depth changes.
pub struct Scanner {
    root: PathBuf,
    walker: walkdir::IntoIter,
    extension: String,
    /// Open directories as (depth, name), root at the bottom
    open: Vec<(usize, String)>,
    pending: VecDeque<ScanEvent>,
    done: bool,
}

impl Scanner {
    /// Create a scanner rooted at `root`, recognizing `.json` descriptors
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_extension(root, CONTENT_EXTENSION)
    }

    /// Create a scanner recognizing a custom descriptor extension
    ///
    /// The extension is matched case-insensitively and given without a dot.
    pub fn with_extension(root: impl AsRef<Path>, extension: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            walker: WalkDir::new(&root).follow_links(true).into_iter(),
            root,
            extension: extension.to_ascii_lowercase(),
            open: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Root directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_descriptor(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase() == self.extension)
            .unwrap_or(false)
    }

    /// Close every open directory at `depth` or deeper
    fn close_to(&mut self, depth: usize) {
        while let Some((open_depth, _)) = self.open.last() {
            if *open_depth < depth {
                break;
            }
            if let Some((open_depth, name)) = self.open.pop() {
                self.pending.push_back(ScanEvent::Exit {
                    name,
                    is_root: open_depth == 0,
                });
            }
        }
    }

    fn read_leaf(path: &Path) -> Option<Descriptor> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read descriptor {:?}: {}", path, e);
                return None;
            }
        };
        match Descriptor::from_json(&bytes) {
            Ok(descriptor) => Some(descriptor),
            Err(reason) => {
                warn!("Failed to parse descriptor {:?}: {}", path, reason);
                None
            }
        }
    }
}

fn segment(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl Iterator for Scanner {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                trace!(?event, "scan event");
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }

            let entry = match self.walker.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    // A missing root is worth a clearer error than walkdir's
                    if e.depth() == 0 && !self.root.exists() {
                        self.done = true;
                        return Some(Err(HideawayError::SourceNotFound(self.root.clone())));
                    }
                    // Link cycles and dangling links are skipped like unreadable leaves
                    if e.loop_ancestor().is_some() {
                        warn!("Skipping symlink loop at {:?}", e.path());
                        continue;
                    }
                    if e.depth() > 0
                        && e.io_error().map(|io| io.kind()) == Some(std::io::ErrorKind::NotFound)
                    {
                        warn!("Skipping dangling link {:?}", e.path());
                        continue;
                    }
                    return Some(Err(e.into()));
                }
                None => {
                    self.close_to(0);
                    self.done = true;
                    continue;
                }
            };

            let depth = entry.depth();
            self.close_to(depth.max(1));

            if entry.file_type().is_dir() {
                let name = segment(entry.path());
                if depth > 0 {
                    self.pending.push_back(ScanEvent::Enter { name: name.clone() });
                }
                self.open.push((depth, name));
            } else if depth > 0 && self.is_descriptor(entry.path()) {
                let descriptor = Self::read_leaf(entry.path());
                self.pending.push_back(ScanEvent::Leaf {
                    file_name: segment(entry.path()),
                    descriptor,
                });
            }
        }
    }
}
