//! Integration tests for Hideaway
//!
//! Publishes realistic collections, then reads them back through
//! [`SiteReader`] and [`SessionContext`] the way a browser client would.

use ::hideaway::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

const KEY: &str = "library key";

/// A published site plus the directories backing it
pub struct PublishedSite {
    pub source_dir: TempDir,
    pub output_dir: TempDir,
    pub report: PublishReport,
}

impl PublishedSite {
    /// Publish a small library with public, secret and link entries
    pub fn library() -> anyhow::Result<Self> {
        let source_dir = TempDir::new()?;
        let root = source_dir.path();

        write_descriptor(root, "Welcome.json", r#"{"title": "Welcome", "summary": "Start here"}"#)?;
        write_descriptor(
            root,
            "manuals/Setup.json",
            r#"{"title": "Setup", "file_url": [{"title": "mirror", "content": [{"name": "a", "url": "https://a"}]}]}"#,
        )?;
        write_descriptor(
            root,
            "manuals/Advanced.json",
            r#"{"is_secret": true, "title": "Advanced", "description": ["internal"]}"#,
        )?;
        write_descriptor(
            root,
            "links/Docs.json",
            r#"{"type": "url", "title": "Docs", "url": "https://docs.example"}"#,
        )?;
        write_descriptor(
            root,
            "vault/deep/Plans.json",
            r#"{"is_secret": true, "title": "Plans", "cover": "plans.png"}"#,
        )?;

        let output_dir = TempDir::new()?;
        let report = PublisherBuilder::new()
            .mode(BuildMode::Production)
            .build(root, output_dir.path(), ServerKey::new(KEY)?)?
            .publish()?;
        info!("Published library to {:?}", output_dir.path());

        Ok(Self {
            source_dir,
            output_dir,
            report,
        })
    }

    pub fn reader(&self) -> SiteReader {
        SiteReader::new(self.output_dir.path())
    }
}

fn write_descriptor(root: &Path, rel: &str, json: &str) -> anyhow::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_client_sees_public_only() {
        let site = PublishedSite::library().unwrap();
        let reader = site.reader();

        let tree = reader.public_tree().await.unwrap();
        assert_eq!(tree.name, "source");
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["links", "manuals"]);
        assert_eq!(tree.find("manuals").unwrap().files.len(), 1);
        assert!(tree.all_files().iter().all(|f| f.is_secret.is_none()));

        let search = reader.public_search().await.unwrap();
        assert!(search.iter().all(|e| e.name != "Advanced" && e.name != "Plans"));
        assert!(search.iter().any(|e| e.kind == SearchKind::Dir && e.path == "manuals"));

        let setup = tree.find("manuals").unwrap().files[0].clone();
        let payload = reader.open(&setup, None).await.unwrap();
        assert_eq!(payload.title, "Setup");
        assert!(payload.file_url.is_some());
    }

    #[tokio::test]
    async fn test_verified_client_sees_everything() {
        let site = PublishedSite::library().unwrap();
        let reader = site.reader();
        let cache = Arc::new(MemorySecretCache::new());

        let session = SessionContext::mount(&reader, cache.clone()).await.unwrap();
        assert_eq!(session.wait_checked().await.unwrap(), Outcome::Denied);

        let outcome = session.verify_secret(KEY).await.unwrap();
        let token = outcome.token().cloned().unwrap();
        assert_eq!(token, site.report.token);

        let full = reader.full_tree(&token).await.unwrap();
        let plans = full.find("vault/deep").unwrap().files[0].clone();
        assert_eq!(plans.is_secret, Some(true));

        let payload = reader.open(&plans, Some(&token)).await.unwrap();
        assert_eq!(payload.cover.as_deref(), Some("plans.png"));

        let search = reader.full_search(&token).await.unwrap();
        assert!(search
            .iter()
            .filter(|e| e.kind != SearchKind::Dir)
            .all(|e| e.is_secret.is_some()));
        assert!(search.iter().any(|e| e.path == "vault/deep/Plans.f"));
    }

    #[tokio::test]
    async fn test_secret_entry_requires_token() {
        let site = PublishedSite::library().unwrap();
        let reader = site.reader();
        let full = reader.full_tree(&site.report.token).await.unwrap();
        let advanced = full
            .find("manuals")
            .unwrap()
            .files
            .iter()
            .find(|f| f.name == "Advanced")
            .cloned()
            .unwrap();

        let err = reader.open(&advanced, None).await.unwrap_err();
        assert!(matches!(err, HideawayError::AccessDenied(_)));
        // Not reachable as a public payload either
        assert!(matches!(
            reader.public_leaf(&advanced.json_name).await,
            Err(HideawayError::ArtifactNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_url_entry_has_no_payload() {
        let site = PublishedSite::library().unwrap();
        let reader = site.reader();
        let tree = reader.public_tree().await.unwrap();
        let docs = tree.find("links").unwrap().files[0].clone();

        assert_eq!(docs.json_name, "https://docs.example");
        assert!(matches!(reader.open(&docs, None).await, Err(HideawayError::ArtifactNotFound(_))));
    }

    #[tokio::test]
    async fn test_cached_intermediate_survives_sessions() {
        let site = PublishedSite::library().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("secret.json");
        let reader = site.reader();

        let first = SessionContext::mount(&reader, Arc::new(FileSecretCache::new(&cache_path)))
            .await
            .unwrap();
        assert!(first.verify_secret(KEY).await.unwrap().is_granted());

        let stored = fs::read_to_string(&cache_path).unwrap();
        assert!(!stored.contains(KEY));

        let second = SessionContext::mount(&reader, Arc::new(FileSecretCache::new(&cache_path)))
            .await
            .unwrap();
        assert_eq!(second.token(), Some(site.report.token.clone()));
        assert_eq!(second.wait_granted().await.unwrap(), site.report.token);
    }

    #[tokio::test]
    async fn test_rebuild_invalidates_cached_intermediate() {
        let mut site = PublishedSite::library().unwrap();
        let cache = Arc::new(MemorySecretCache::new());
        let reader = site.reader();

        let session = SessionContext::mount(&reader, cache.clone()).await.unwrap();
        assert!(session.verify_secret(KEY).await.unwrap().is_granted());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        site.report = PublisherBuilder::new()
            .clean_before_build(true)
            .build(site.source_dir.path(), site.output_dir.path(), ServerKey::new(KEY).unwrap())
            .unwrap()
            .publish()
            .unwrap();

        let remounted = SessionContext::mount(&reader, cache).await.unwrap();
        assert_eq!(remounted.check_cached(), Outcome::Denied);
        assert!(remounted.verify_secret(KEY).await.unwrap().is_granted());
        assert_eq!(remounted.token(), Some(site.report.token.clone()));
    }

    #[tokio::test]
    async fn test_wrong_secret_denied() {
        let site = PublishedSite::library().unwrap();
        let cache = Arc::new(MemorySecretCache::new());
        let session = SessionContext::mount(&site.reader(), cache.clone()).await.unwrap();

        assert_eq!(session.verify_secret("guess").await.unwrap(), Outcome::Denied);
        assert!(session.token().is_none());
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn test_mount_without_site_fails() {
        let empty = TempDir::new().unwrap();
        let result = SessionContext::mount(&SiteReader::new(empty.path()), Arc::new(MemorySecretCache::new())).await;
        assert!(matches!(result, Err(HideawayError::ArtifactNotFound(_))));
    }
}
