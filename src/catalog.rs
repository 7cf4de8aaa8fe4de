//! Catalog synchronization.
//!
//! [`CatalogSynchronizer`] is the listener that turns repository
//! registration notifications into persisted catalog writes. Each batch
//! of registered sources is filtered down to text sources, converted to
//! catalog entries carrying their retrieval URL, and merged into the
//! store under a fresh module set version: one atomic merge per batch,
//! no write at all when the batch holds nothing of interest.
//!
//! Unregistration never removes catalog entries. Downstream consumers
//! rely on the catalog being additive-only.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::models::{CatalogEntry, PotentialSource, SourceIdentifier};
use crate::repository::SourceListener;
use crate::store::CatalogStore;

pub struct CatalogSynchronizer {
    store: Arc<dyn CatalogStore>,
    bind_address: String,
    bind_port: u16,
}

impl CatalogSynchronizer {
    pub fn new(store: Arc<dyn CatalogStore>, bind_address: impl Into<String>, bind_port: u16) -> Self {
        Self {
            store,
            bind_address: bind_address.into(),
            bind_port,
        }
    }

    /// Converts a registration batch into catalog entries: text sources
    /// only, input order preserved, absent revisions normalized to `""`
    /// by the entry constructor.
    fn entries_for(&self, batch: &[PotentialSource]) -> Vec<CatalogEntry> {
        batch
            .iter()
            .filter(|source| source.is_text())
            .map(|source| CatalogEntry::from_source(&source.identifier, &self.bind_address, self.bind_port))
            .collect()
    }
}

#[async_trait]
impl SourceListener for CatalogSynchronizer {
    async fn on_source_encountered(&self, identifier: &SourceIdentifier) {
        debug!("source {} encountered", identifier);
    }

    async fn on_sources_registered(&self, batch: &[PotentialSource]) -> Result<()> {
        let entries = self.entries_for(batch);
        if entries.is_empty() {
            // Nothing text-format in the batch; skip the write so the
            // catalog version does not churn.
            return Ok(());
        }

        let version_id = next_version_id();
        debug!(
            "merging {} catalog entr(ies) under module set {}",
            entries.len(),
            version_id
        );
        self.store.merge(&version_id, &entries).await
    }

    async fn on_source_unregistered(&self, source: &PotentialSource) {
        // Catalog entries stay; only resolution bindings go away.
        debug!("source {} unregistered", source.identifier);
    }
}

/// Fresh module set version: a nanosecond wall-clock reading. Unique with
/// high probability across merges, not a strict sequence.
fn next_version_id() -> String {
    Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceFormat;
    use crate::store::MemoryCatalogStore;

    fn text(name: &str, revision: Option<&str>) -> PotentialSource {
        PotentialSource::text(SourceIdentifier::new(name, revision.map(str::to_string)))
    }

    fn ast(name: &str, revision: Option<&str>) -> PotentialSource {
        PotentialSource::new(
            SourceIdentifier::new(name, revision.map(str::to_string)),
            SourceFormat::Ast,
        )
    }

    fn synchronizer() -> (Arc<MemoryCatalogStore>, CatalogSynchronizer) {
        let store = Arc::new(MemoryCatalogStore::new());
        let sync = CatalogSynchronizer::new(store.clone(), "10.0.0.1", 8080);
        (store, sync)
    }

    #[tokio::test]
    async fn registers_text_sources_with_urls() {
        let (store, sync) = synchronizer();
        sync.on_sources_registered(&[text("foo", None), text("bar", Some("2020-01-01"))])
            .await
            .unwrap();

        let catalog = store.load().await.unwrap().unwrap();
        assert!(!catalog.module_set_id.is_empty());
        assert_eq!(catalog.modules.len(), 2);

        let foo = catalog.modules.iter().find(|m| m.name == "foo").unwrap();
        assert_eq!(foo.revision, "");
        assert_eq!(foo.schema_url, "http://10.0.0.1:8080/schemas/foo/");

        let bar = catalog.modules.iter().find(|m| m.name == "bar").unwrap();
        assert_eq!(bar.revision, "2020-01-01");
        assert_eq!(bar.schema_url, "http://10.0.0.1:8080/schemas/bar/2020-01-01");
    }

    #[tokio::test]
    async fn non_text_sources_are_filtered_out() {
        let (store, sync) = synchronizer();
        sync.on_sources_registered(&[ast("foo", None), text("bar", None)])
            .await
            .unwrap();

        let catalog = store.load().await.unwrap().unwrap();
        assert_eq!(catalog.modules.len(), 1);
        assert_eq!(catalog.modules[0].name, "bar");
    }

    #[tokio::test]
    async fn all_ast_batch_writes_nothing() {
        let (store, sync) = synchronizer();
        sync.on_sources_registered(&[ast("foo", None), ast("bar", Some("2020-01-01"))])
            .await
            .unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_batch_does_not_touch_version() {
        let (store, sync) = synchronizer();
        sync.on_sources_registered(&[text("foo", None)]).await.unwrap();
        let before = store.load().await.unwrap().unwrap().module_set_id;

        sync.on_sources_registered(&[]).await.unwrap();
        let after = store.load().await.unwrap().unwrap().module_set_id;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn merges_union_across_batches() {
        let (store, sync) = synchronizer();
        sync.on_sources_registered(&[text("a", Some("2019-01-01"))])
            .await
            .unwrap();
        sync.on_sources_registered(&[text("b", Some("2020-01-01"))])
            .await
            .unwrap();

        let catalog = store.load().await.unwrap().unwrap();
        let names: Vec<&str> = catalog.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unregister_keeps_catalog_entries() {
        let (store, sync) = synchronizer();
        let source = text("foo", None);
        sync.on_sources_registered(std::slice::from_ref(&source))
            .await
            .unwrap();
        sync.on_source_unregistered(&source).await;

        let catalog = store.load().await.unwrap().unwrap();
        assert_eq!(catalog.modules.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        struct FailingStore;

        #[async_trait]
        impl CatalogStore for FailingStore {
            async fn merge(&self, _version_id: &str, _entries: &[CatalogEntry]) -> Result<()> {
                anyhow::bail!("store unavailable")
            }

            async fn load(&self) -> Result<Option<crate::models::Catalog>> {
                Ok(None)
            }
        }

        let sync = CatalogSynchronizer::new(Arc::new(FailingStore), "127.0.0.1", 8181);
        let err = sync
            .on_sources_registered(&[text("foo", None)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("store unavailable"));
    }
}
