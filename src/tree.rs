//! Index tree assembly
//!
//! [`TreeBuilder`] is a pure reducer over [`ScanEvent`]s. It keeps a stack of
//! open directory nodes (with the root sentinel at the bottom), a breadcrumb of
//! path segments, and the flat search list for one [`Partition`].
//!
//! Closing a directory sorts its children and files by name and either hands
//! the node to its parent or, when nothing survived filtering, drops it. The
//! public partition therefore never shows a directory that only held secret
//! leaves.
//!
//! ```rust
//! use hideaway::scanner::ScanEvent;
//! use hideaway::tree::TreeBuilder;
//! use hideaway::types::{Descriptor, Partition};
//!
//! let mut builder = TreeBuilder::new(Partition::Public);
//! builder.apply(ScanEvent::Enter { name: "guides".into() });
//! builder.apply(ScanEvent::Leaf {
//!     file_name: "Intro.json".into(),
//!     descriptor: Some(Descriptor::from_json(br#"{"title": "Intro"}"#).unwrap()),
//! });
//! builder.apply(ScanEvent::Exit { name: "guides".into(), is_root: false });
//!
//! let index = builder.finish();
//! assert_eq!(index.tree.children[0].files[0].json_name, "Intro.json");
//! assert_eq!(index.search[0].path, "guides/Intro.f");
//! ```

use crate::error::Result;
use crate::scanner::ScanEvent;
use crate::types::{
    Descriptor, DescriptorKind, FileDetail, Partition, PathTree, SearchEntry, SearchKind, FILE_MARKER,
};
use tracing::{debug, trace, warn};

/// A leaf the builder admitted into its partition
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedLeaf {
    /// Source file name, which is also the payload file name
    pub file_name: String,
    /// The parsed descriptor
    pub descriptor: Descriptor,
}

/// Result of one builder pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutput {
    /// Root sentinel with the whole surviving tree beneath it
    pub tree: PathTree,
    /// Flattened search entries in emission order
    pub search: Vec<SearchEntry>,
}

/// Reducer turning scan events into one partition's index
#[derive(Debug)]
pub struct TreeBuilder {
    partition: Partition,
    stack: Vec<PathTree>,
    breadcrumb: Vec<String>,
    search: Vec<SearchEntry>,
    pruned: usize,
}

impl TreeBuilder {
    /// Start a pass with only the root sentinel on the stack
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            stack: vec![PathTree::root()],
            breadcrumb: Vec::new(),
            search: Vec::new(),
            pruned: 0,
        }
    }

    /// Partition this builder filters for
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Number of directories dropped so far because they ended up empty
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    /// Apply one event, returning the leaf if it was admitted
    pub fn apply(&mut self, event: ScanEvent) -> Option<AcceptedLeaf> {
        match event {
            ScanEvent::Leaf { file_name, descriptor } => {
                let descriptor = descriptor?;
                if !self.partition.admits(&descriptor) {
                    trace!("Skipping secret leaf {} in {} pass", file_name, self.partition);
                    return None;
                }
                self.push_leaf(&file_name, &descriptor);
                Some(AcceptedLeaf { file_name, descriptor })
            }
            ScanEvent::Enter { name } => {
                self.stack.push(PathTree::new(name.clone()));
                self.breadcrumb.push(name);
                None
            }
            ScanEvent::Exit { name, is_root } => {
                if !is_root {
                    self.close(name);
                }
                None
            }
        }
    }

    fn push_leaf(&mut self, file_name: &str, descriptor: &Descriptor) {
        let kind = descriptor.kind();
        let secrecy = self.partition.exposes_secrecy().then_some(descriptor.is_secret);
        let target = match kind {
            DescriptorKind::File => file_name.to_string(),
            DescriptorKind::Url => descriptor.url.clone().unwrap_or_default(),
        };
        let path = match kind {
            DescriptorKind::File => format!("{}{}", self.join_with(&descriptor.title), FILE_MARKER),
            DescriptorKind::Url => target.clone(),
        };

        if let Some(top) = self.stack.last_mut() {
            top.files.push(FileDetail {
                name: descriptor.title.clone(),
                kind,
                json_name: target,
                is_secret: secrecy,
            });
        }
        self.search.push(SearchEntry {
            name: descriptor.title.clone(),
            path,
            kind: kind.into(),
            json_name: Some(file_name.to_string()),
            is_secret: secrecy,
        });
    }

    fn close(&mut self, name: String) {
        self.breadcrumb.pop();

        if self.stack.len() <= 1 {
            warn!("Unbalanced exit for {:?}; keeping root on the stack", name);
            return;
        }
        let Some(mut node) = self.stack.pop() else {
            return;
        };

        sort_node(&mut node);
        if node.is_empty() {
            debug!("Pruning empty directory {:?} from {} index", name, self.partition);
            self.pruned += 1;
            return;
        }

        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
        self.search.push(SearchEntry {
            path: self.join_with(&name),
            name,
            kind: SearchKind::Dir,
            json_name: None,
            is_secret: None,
        });
    }

    /// Breadcrumb joined with `/`, followed by `last`
    fn join_with(&self, last: &str) -> String {
        if self.breadcrumb.is_empty() {
            last.to_string()
        } else {
            format!("{}/{}", self.breadcrumb.join("/"), last)
        }
    }

    /// Finish the pass and return the root and search list
    ///
    /// Directories still open (an event stream that stopped early) are
    /// discarded. The root's own children and files are sorted here since
    /// the root never receives a closing event.
    pub fn finish(mut self) -> IndexOutput {
        if self.stack.len() > 1 {
            warn!(
                "{} directories were never closed in {} pass; dropping them",
                self.stack.len() - 1,
                self.partition
            );
            self.stack.truncate(1);
        }
        let mut tree = self.stack.pop().unwrap_or_else(PathTree::root);
        sort_node(&mut tree);
        IndexOutput {
            tree,
            search: self.search,
        }
    }
}

/// Sort a node's children and files ascending by name
///
/// Ordering is plain byte-wise string comparison. The sort is stable, so
/// sorting an already sorted node changes nothing.
pub fn sort_node(node: &mut PathTree) {
    node.children.sort_by(|a, b| a.name.cmp(&b.name));
    node.files.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Run a complete pass over an event stream
///
/// `on_leaf` sees every admitted leaf in walk order and may fail, which
/// aborts the pass. Scan errors abort it as well.
pub fn build_index<I, F>(events: I, partition: Partition, mut on_leaf: F) -> Result<IndexOutput>
where
    I: IntoIterator<Item = Result<ScanEvent>>,
    F: FnMut(&AcceptedLeaf) -> Result<()>,
{
    let mut builder = TreeBuilder::new(partition);
    for event in events {
        if let Some(leaf) = builder.apply(event?) {
            on_leaf(&leaf)?;
        }
    }
    debug!(
        "{} pass finished: {} search entries, {} pruned directories",
        partition,
        builder.search.len(),
        builder.pruned
    );
    Ok(builder.finish())
}
