//! End-to-end build scenarios run against the library internals

#[cfg(test)]
mod build_scenarios {
    use crate::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn write(root: &Path, rel: &str, json: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, json).unwrap();
    }

    fn read<T: serde::de::DeserializeOwned>(path: &Path) -> T {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_mixed_collection() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "Intro.json", r#"{"is_secret": false, "type": "file", "title": "Intro"}"#);
        write(
            src.path(),
            "Secret Link.json",
            r#"{"is_secret": true, "type": "url", "title": "Secret Link", "url": "https://x"}"#,
        );
        write(src.path(), "vault/only.json", r#"{"is_secret": true, "title": "Only"}"#);
        write(src.path(), "guides/setup.json", r#"{"title": "Setup", "file_url": []}"#);

        let key = ServerKey::new("build key").unwrap();
        let publisher = PublisherBuilder::new().build(src.path(), out.path(), key.clone()).unwrap();
        let report = publisher.publish().unwrap();

        let public: PathTree = read(&out.path().join("path.json"));
        let public_search: Vec<SearchEntry> = read(&out.path().join("search.json"));
        assert_eq!(
            serde_json::to_value(&public.files).unwrap(),
            serde_json::json!([{"name": "Intro", "type": "file", "json_name": "Intro.json"}])
        );
        assert!(public.find("vault").is_none());
        assert!(public.find("guides").is_some());
        assert!(public_search.iter().all(|e| e.is_secret.is_none()));
        assert!(public_search
            .iter()
            .any(|e| e.path == "Intro.f" && e.json_name.as_deref() == Some("Intro.json")));

        let token = resolve_opaque_directory_name(&report.record, &key);
        assert_eq!(token, report.token);
        let full: PathTree = read(&out.path().join(token.path_index()));
        let link = full.files.iter().find(|f| f.name == "Secret Link").unwrap();
        assert_eq!(
            serde_json::to_value(link).unwrap(),
            serde_json::json!({"name": "Secret Link", "type": "url", "json_name": "https://x", "is_secret": true})
        );
        assert!(full.find("vault").is_some());

        assert!(out.path().join("Intro.json").exists());
        assert!(!out.path().join("guides").exists());
        assert!(out.path().join("setup.json").exists());
        assert!(out.path().join(token.as_str()).join("only.json").exists());
        assert!(!out.path().join("only.json").exists());
        assert!(!out.path().join("Secret Link.json").exists());

        assert_eq!(report.public.payloads_written, 2);
        assert_eq!(report.full.payloads_written, 1);
        assert_eq!(report.full.tree_files, 4);
        assert_eq!(report.public.tree_files, 2);
    }

    #[test]
    #[traced_test]
    fn test_malformed_descriptor_leaves_gap() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "good.json", r#"{"title": "Good"}"#);
        write(src.path(), "bad.json", r#"{"title": "#);

        let publisher = PublisherBuilder::new()
            .build(src.path(), out.path(), ServerKey::new("k").unwrap())
            .unwrap();
        let report = publisher.publish().unwrap();

        assert_eq!(report.public.tree_files, 1);
        assert!(logs_contain("Failed to parse descriptor"));
    }

    #[test]
    fn test_epoch_record_matches_client_derivation() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let publisher = PublisherBuilder::new()
            .build(src.path(), out.path(), ServerKey::new("pass phrase").unwrap())
            .unwrap();
        let report = publisher.publish().unwrap();

        let record: EpochRecord = read(&out.path().join("update_time.json"));
        assert_eq!(record, report.record);

        let intermediate = IntermediateKey::derive("pass phrase", record.update_time);
        assert_eq!(intermediate.unlock(record.update_time, &record.update_id), Some(report.token.clone()));
        assert_eq!(publisher.resolve_directory().unwrap(), report.token);
    }
}
