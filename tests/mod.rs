//! Main test module for Hideaway
//!
//! This module includes all test suites:
//! - Integration tests that publish a site and read it back as a client
//! - Property-based tests for partition and derivation invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::hideaway::*;
    use std::fs;
    use tempfile::TempDir;

    fn publisher(src: &TempDir, out: &TempDir) -> Publisher {
        PublisherBuilder::new()
            .build(src.path(), out.path(), ServerKey::new("edge key").unwrap())
            .unwrap()
    }

    #[test]
    fn test_empty_source() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();

        let report = publisher(&src, &out).publish().unwrap();

        assert_eq!(report.public.tree_files, 0);
        assert_eq!(report.full.search_entries, 0);
        let tree: PathTree = serde_json::from_slice(&fs::read(out.path().join("path.json")).unwrap()).unwrap();
        assert_eq!(tree, PathTree::root());
        // The secret directory exists even when nothing is secret
        assert!(out.path().join(report.token.as_str()).is_dir());
    }

    #[test]
    fn test_missing_source() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let p = PublisherBuilder::new()
            .build(src.path().join("nope"), out.path(), ServerKey::new("k").unwrap())
            .unwrap();

        assert!(matches!(p.publish(), Err(HideawayError::SourceNotFound(_))));
        assert!(!out.path().join("update_time.json").exists());
    }

    #[test]
    fn test_special_titles() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let titles = ["with spaces", "ünïcödé", "dots.in.name", "emoji 🎉"];
        for (i, title) in titles.iter().enumerate() {
            fs::write(
                src.path().join(format!("leaf{}.json", i)),
                format!(r#"{{"title": {:?}}}"#, title),
            )
            .unwrap();
        }

        let report = publisher(&src, &out).publish().unwrap();
        assert_eq!(report.public.tree_files, titles.len());

        let search: Vec<SearchEntry> =
            serde_json::from_slice(&fs::read(out.path().join("search.json")).unwrap()).unwrap();
        for title in titles {
            assert!(search.iter().any(|e| e.path == format!("{}.f", title)), "missing {}", title);
        }
    }

    #[test]
    fn test_non_descriptor_files_ignored() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("notes.txt"), "not a descriptor").unwrap();
        fs::write(src.path().join("a.json"), r#"{"title": "A"}"#).unwrap();

        let report = publisher(&src, &out).publish().unwrap();
        assert_eq!(report.public.tree_files, 1);
        assert!(!out.path().join("notes.txt").exists());
    }

    #[test]
    fn test_rebuild_rotates_token() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("s.json"), r#"{"is_secret": true, "title": "S"}"#).unwrap();
        let p = PublisherBuilder::new()
            .clean_before_build(true)
            .build(src.path(), out.path(), ServerKey::new("k").unwrap())
            .unwrap();

        let first = p.publish().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = p.publish().unwrap();

        assert_ne!(first.record.update_time, second.record.update_time);
        assert_ne!(first.token, second.token);
        assert!(!out.path().join(first.token.as_str()).exists());
        assert!(out.path().join(second.token.as_str()).join("s.json").exists());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(ServerKey::new(""), Err(HideawayError::InvalidConfiguration(_))));
    }
}
