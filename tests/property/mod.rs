//! Property-based testing for Hideaway
//!
//! Uses proptest to check partition, ordering and derivation invariants over
//! randomly generated descriptor collections.

use ::hideaway::scanner::ScanEvent;
use ::hideaway::tree::{IndexOutput, TreeBuilder};
use ::hideaway::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A generated source tree
#[derive(Debug, Clone)]
pub enum SourceNode {
    Leaf { title: String, secret: bool, url: bool },
    Dir { name: String, children: Vec<SourceNode> },
}

impl SourceNode {
    fn descriptor_json(title: &str, secret: bool, url: bool) -> serde_json::Value {
        if url {
            serde_json::json!({"is_secret": secret, "type": "url", "title": title, "url": format!("https://{}", title)})
        } else {
            serde_json::json!({"is_secret": secret, "type": "file", "title": title})
        }
    }

    /// Flatten into the event stream a scanner would produce
    fn push_events(&self, out: &mut Vec<ScanEvent>) {
        match self {
            SourceNode::Leaf { title, secret, url } => {
                let bytes = serde_json::to_vec(&Self::descriptor_json(title, *secret, *url)).unwrap();
                out.push(ScanEvent::Leaf {
                    file_name: format!("{}.json", title),
                    descriptor: Some(Descriptor::from_json(&bytes).unwrap()),
                });
            }
            SourceNode::Dir { name, children } => {
                out.push(ScanEvent::Enter { name: name.clone() });
                for child in children {
                    child.push_events(out);
                }
                out.push(ScanEvent::Exit { name: name.clone(), is_root: false });
            }
        }
    }

    /// Materialize on disk, prefixing leaf files so names never collide
    fn write_to(&self, dir: &Path, counter: &mut usize) {
        match self {
            SourceNode::Leaf { title, secret, url } => {
                *counter += 1;
                let path = dir.join(format!("{}_{}.json", counter, title));
                fs::write(path, Self::descriptor_json(title, *secret, *url).to_string()).unwrap();
            }
            SourceNode::Dir { name, children } => {
                let sub = dir.join(name);
                fs::create_dir_all(&sub).unwrap();
                for child in children {
                    child.write_to(&sub, counter);
                }
            }
        }
    }

    fn count_leaves(&self, admit: &dyn Fn(bool) -> bool) -> usize {
        match self {
            SourceNode::Leaf { secret, .. } => admit(*secret) as usize,
            SourceNode::Dir { children, .. } => children.iter().map(|c| c.count_leaves(admit)).sum(),
        }
    }
}

/// Generate a nested collection of leaves and directories
fn source_strategy() -> impl Strategy<Value = Vec<SourceNode>> {
    let leaf = ("[A-Za-z][a-z0-9 ]{0,7}", any::<bool>(), any::<bool>())
        .prop_map(|(title, secret, url)| SourceNode::Leaf { title, secret, url });
    let node = leaf.prop_recursive(4, 48, 6, |inner| {
        ("[a-z]{1,6}", prop::collection::vec(inner, 0..6))
            .prop_map(|(name, children)| SourceNode::Dir { name, children })
    });
    prop::collection::vec(node, 0..8)
}

fn build(partition: Partition, roots: &[SourceNode]) -> IndexOutput {
    let mut events = Vec::new();
    for node in roots {
        node.push_events(&mut events);
    }
    let mut builder = TreeBuilder::new(partition);
    for event in events {
        builder.apply(event);
    }
    builder.finish()
}

fn assert_sorted_and_pruned(node: &PathTree, is_root: bool) -> std::result::Result<(), TestCaseError> {
    prop_assert!(is_root || !node.is_empty(), "empty directory {:?} survived", node.name);
    prop_assert!(node.children.windows(2).all(|w| w[0].name <= w[1].name));
    prop_assert!(node.files.windows(2).all(|w| w[0].name <= w[1].name));
    for child in &node.children {
        assert_sorted_and_pruned(child, false)?;
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_public_is_subset_of_full(roots in source_strategy()) {
        let public = build(Partition::Public, &roots);
        let full = build(Partition::Full, &roots);

        let full_entries: BTreeSet<(String, String)> =
            full.search.iter().map(|e| (e.name.clone(), e.path.clone())).collect();
        for entry in &public.search {
            prop_assert!(full_entries.contains(&(entry.name.clone(), entry.path.clone())));
        }
        prop_assert!(public.search.len() <= full.search.len());
    }

    #[test]
    fn prop_public_never_exposes_secrets(roots in source_strategy()) {
        let public = build(Partition::Public, &roots);

        prop_assert!(public.search.iter().all(|e| e.is_secret.is_none()));
        prop_assert!(public.tree.all_files().iter().all(|f| f.is_secret.is_none()));
        prop_assert_eq!(public.tree.all_files().len(), roots.iter().map(|r| r.count_leaves(&|s| !s)).sum::<usize>());
    }

    #[test]
    fn prop_full_keeps_every_leaf(roots in source_strategy()) {
        let full = build(Partition::Full, &roots);

        let files = full.tree.all_files();
        prop_assert_eq!(files.len(), roots.iter().map(|r| r.count_leaves(&|_| true)).sum::<usize>());
        prop_assert!(files.iter().all(|f| f.is_secret.is_some()));
    }

    #[test]
    fn prop_siblings_sorted_and_empty_dirs_pruned(roots in source_strategy()) {
        for partition in [Partition::Public, Partition::Full] {
            let out = build(partition, &roots);
            prop_assert_eq!(out.tree.name.as_str(), "source");
            assert_sorted_and_pruned(&out.tree, true)?;
        }
    }

    #[test]
    fn prop_derivation_round_trip(
        secret in "[ -~]{1,32}",
        other in "[ -~]{1,32}",
        ts in 0i64..4_102_444_800_000,
    ) {
        let key = ServerKey::new(secret.clone());
        prop_assume!(key.is_ok());
        let record = EpochRecord::derive(ts, &key.unwrap());

        let client = IntermediateKey::derive(&secret, ts);
        let token = client.unlock(ts, &record.update_id);
        prop_assert!(token.is_some());
        prop_assert_eq!(token.clone(), Some(resolve_opaque_directory_name(&record, &ServerKey::new(secret.clone()).unwrap())));

        // The cached intermediate alone reproduces the same token
        let cached = IntermediateKey::from_cached(client.as_str());
        prop_assert_eq!(cached.unlock(ts, &record.update_id), token);

        if other != secret {
            prop_assert!(IntermediateKey::derive(&other, ts).unlock(ts, &record.update_id).is_none());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_published_payloads_land_in_one_root(roots in source_strategy()) {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut counter = 0;
        for node in &roots {
            node.write_to(src.path(), &mut counter);
        }

        let report = PublisherBuilder::new()
            .build(src.path(), out.path(), ServerKey::new("prop key").unwrap())
            .unwrap()
            .publish()
            .unwrap();

        let secret_dir = out.path().join(report.token.as_str());
        for entry in fs::read_dir(&secret_dir).unwrap() {
            let bytes = fs::read(entry.unwrap().path()).unwrap();
            let d = Descriptor::from_json(&bytes).unwrap();
            prop_assert!(d.is_secret);
            prop_assert_eq!(d.kind(), DescriptorKind::File);
        }

        let reserved = ["path.json", "search.json", "update_time.json"];
        for entry in fs::read_dir(out.path()).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if path.is_dir() || reserved.contains(&name.as_str()) || name.starts_with(report.token.as_str()) {
                continue;
            }
            let d = Descriptor::from_json(&fs::read(&path).unwrap()).unwrap();
            prop_assert!(!d.is_secret, "secret payload {} at public root", name);
        }
    }
}
