//! Core data types used throughout the Hideaway library
//!
//! This module contains the data structures shared between the build side
//! (scanner, tree builder, writer) and the client side (site reader, verifier).
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Source content**: `Descriptor`, `LinkGroup`, `Link` - one authored leaf record
//! - **Index output**: `PathTree`, `FileDetail`, `SearchEntry` - what gets published
//! - **Build mode**: `Partition` - public-only vs. full-content pass
//!
//! Field names serialize exactly as the published JSON artifacts expect them
//! (`type`, `json_name`, `is_secret`), so these structs are the wire format.
//!
//! ## Examples
//!
//! ```rust
//! use hideaway::types::{Descriptor, DescriptorKind, Partition};
//!
//! let descriptor = Descriptor::from_json(
//!     br#"{"is_secret": false, "type": "file", "title": "Intro"}"#,
//! ).unwrap();
//!
//! assert_eq!(descriptor.kind(), DescriptorKind::File);
//! assert!(Partition::Public.admits(&descriptor));
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Name of the sentinel node at the top of every index tree
pub const ROOT_NODE_NAME: &str = "source";

/// Extension (without the dot) of descriptor files in the source tree
pub const CONTENT_EXTENSION: &str = "json";

/// Suffix appended to a file's title in its navigable search path
pub const FILE_MARKER: &str = ".f";

/// Kind of a source descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    /// A content payload with link groups, published as its own JSON file
    #[default]
    File,
    /// An external link; nothing is written for it besides index entries
    Url,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::File => write!(f, "file"),
            DescriptorKind::Url => write!(f, "url"),
        }
    }
}

/// A single named link inside a link group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Display name of the link
    pub name: String,
    /// Link target
    pub url: String,
}

/// A titled group of links attached to a file descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGroup {
    /// Group heading
    pub title: String,
    /// Links in authored order
    #[serde(default)]
    pub content: Vec<Link>,
}

/// Source leaf record, authored externally as one JSON file per leaf
///
/// Unknown fields are kept in `extra` so the public/secret payload written
/// for a leaf carries everything the author put in the source file.
///
/// # Invariant
///
/// `url` is present if and only if the kind is [`DescriptorKind::Url`].
/// [`Descriptor::from_json`] rejects records that break it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Whether the leaf belongs to the secret partition
    #[serde(default)]
    pub is_secret: bool,
    /// Declared kind; absent means [`DescriptorKind::File`]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DescriptorKind>,
    /// Title, used as the entry name in every index
    pub title: String,
    /// Optional cover image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Optional one-line summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Optional description paragraphs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<String>>,
    /// Link groups for file descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<Vec<LinkGroup>>,
    /// Target for url descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Any other authored fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// The record exactly as authored, kept for publishing
    #[serde(skip)]
    source: Vec<u8>,
}

impl Descriptor {
    /// Parse and validate a descriptor from raw JSON bytes
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the bytes are not valid JSON,
    /// do not match the descriptor shape, or break the url/kind invariant.
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, String> {
        let mut descriptor: Descriptor = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        descriptor.validate()?;
        descriptor.source = bytes.to_vec();
        Ok(descriptor)
    }

    /// Bytes published as this leaf's payload
    ///
    /// A descriptor read with [`Descriptor::from_json`] publishes its source
    /// bytes unchanged: key order, absent fields and formatting survive. One
    /// built or deserialized any other way is serialized as pretty JSON.
    pub fn payload(&self) -> serde_json::Result<Cow<'_, [u8]>> {
        if self.source.is_empty() {
            serde_json::to_vec_pretty(self).map(Cow::Owned)
        } else {
            Ok(Cow::Borrowed(&self.source))
        }
    }

    /// Effective kind, defaulting to [`DescriptorKind::File`]
    pub fn kind(&self) -> DescriptorKind {
        self.kind.unwrap_or_default()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match (self.kind(), self.url.as_deref()) {
            (DescriptorKind::Url, None) => Err("descriptor of type \"url\" has no url".to_string()),
            (DescriptorKind::Url, Some(url)) if url.is_empty() => {
                Err("descriptor of type \"url\" has an empty url".to_string())
            }
            (DescriptorKind::File, Some(_)) => {
                Err("descriptor of type \"file\" must not carry a url".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Entry for one leaf inside a [`PathTree`] node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetail {
    /// Leaf title
    pub name: String,
    /// Leaf kind
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    /// Payload filename for files, the raw target for urls
    pub json_name: String,
    /// Secrecy flag; only present in the full-tree variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
}

/// A directory node of the published index tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTree {
    /// Directory name (the root is always [`ROOT_NODE_NAME`])
    pub name: String,
    /// Subdirectories, ascending by name once the node is closed
    #[serde(default)]
    pub children: Vec<PathTree>,
    /// Leaves, ascending by name once the node is closed
    #[serde(default)]
    pub files: Vec<FileDetail>,
}

impl PathTree {
    /// Create an empty node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Create the empty root sentinel
    pub fn root() -> Self {
        Self::new(ROOT_NODE_NAME)
    }

    /// Whether the node has neither children nor files
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.files.is_empty()
    }

    /// Walk the tree depth-first, yielding every file entry
    pub fn all_files(&self) -> Vec<&FileDetail> {
        let mut out: Vec<&FileDetail> = self.files.iter().collect();
        for child in &self.children {
            out.extend(child.all_files());
        }
        out
    }

    /// Find a direct or nested child by slash-separated path from this node
    pub fn find(&self, path: &str) -> Option<&PathTree> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.children.iter().find(|c| c.name == segment))
    }
}

/// Kind of a flattened search entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// A file leaf
    File,
    /// A directory that survived pruning
    Dir,
    /// An external link leaf
    Url,
}

impl From<DescriptorKind> for SearchKind {
    fn from(kind: DescriptorKind) -> Self {
        match kind {
            DescriptorKind::File => SearchKind::File,
            DescriptorKind::Url => SearchKind::Url,
        }
    }
}

/// Flattened per-node search record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    /// Display name (title for leaves, segment for directories)
    pub name: String,
    /// Navigable path, or the raw target for url leaves
    pub path: String,
    /// Entry kind
    #[serde(rename = "type")]
    pub kind: SearchKind,
    /// Backing leaf filename; absent for directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,
    /// Secrecy flag; only present in the full search list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
}

/// Which slice of the collection a build pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Non-secret content only
    Public,
    /// Everything, with secrecy flags exposed
    Full,
}

impl Partition {
    /// Whether a descriptor belongs in this partition's index
    pub fn admits(&self, descriptor: &Descriptor) -> bool {
        match self {
            Partition::Public => !descriptor.is_secret,
            Partition::Full => true,
        }
    }

    /// Whether entries carry the `is_secret` flag
    pub fn exposes_secrecy(&self) -> bool {
        matches!(self, Partition::Full)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Public => write!(f, "public"),
            Partition::Full => write!(f, "full"),
        }
    }
}
