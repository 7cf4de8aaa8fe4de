//! Shared schema source repository.
//!
//! The repository is the coupling point between the write path (sources
//! discovered and registered, listeners notified) and the read path
//! (asynchronous resolution of one source by identifier). It owns no
//! source content itself; every registered source is backed by a
//! [`SourceProvider`] that materializes the bytes on demand.
//!
//! Listener notification is synchronous: [`SharedSourceRepository::register_sources`]
//! does not return until every listener callback has completed, so a
//! caller that registers sources knows any derived state (such as the
//! persisted catalog) is up to date when the call returns. No internal
//! lock is held across a listener callback.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{PotentialSource, SourceFormat, SourceIdentifier};

/// Why a resolution failed.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No registered source matches the identifier in the requested format.
    #[error("no source registered for {0}")]
    Unavailable(SourceIdentifier),
    /// A provider was found but could not produce the bytes.
    #[error("provider failed for {identifier}: {message}")]
    Provider {
        identifier: SourceIdentifier,
        message: String,
    },
}

/// Materializes the bytes of a registered source on demand.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn read(&self, identifier: &SourceIdentifier) -> Result<Vec<u8>>;
}

/// Receives repository notifications.
///
/// `on_sources_registered` is the only fallible callback: its error
/// propagates out of the registration call that triggered it, and no
/// further listeners are notified for that batch.
#[async_trait]
pub trait SourceListener: Send + Sync {
    /// A source's content passed through the repository (it was resolved).
    async fn on_source_encountered(&self, _identifier: &SourceIdentifier) {}

    /// A batch of sources became available.
    async fn on_sources_registered(&self, _batch: &[PotentialSource]) -> Result<()> {
        Ok(())
    }

    /// A source is no longer available for resolution.
    async fn on_source_unregistered(&self, _source: &PotentialSource) {}
}

struct Binding {
    source: PotentialSource,
    provider: Arc<dyn SourceProvider>,
}

/// In-process source repository with listener notification.
///
/// Thread-safe for concurrent registration and resolution. Bindings are
/// keyed by name; several revisions (and formats) of the same name can
/// coexist, and a later registration of the same (identifier, format)
/// replaces the earlier provider.
pub struct SharedSourceRepository {
    bindings: RwLock<HashMap<String, Vec<Binding>>>,
    listeners: RwLock<Vec<Arc<dyn SourceListener>>>,
}

impl SharedSourceRepository {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Registers a listener and replays the currently known sources to it
    /// as a single batch, so late listeners still see the full picture.
    /// A replay failure propagates and the listener stays registered.
    pub async fn register_listener(&self, listener: Arc<dyn SourceListener>) -> Result<()> {
        let snapshot = self.registered_sources().await;
        self.listeners.write().await.push(listener.clone());
        if !snapshot.is_empty() {
            listener.on_sources_registered(&snapshot).await?;
        }
        Ok(())
    }

    /// Registers a batch of sources served by `provider`, then notifies
    /// every listener with the batch. Returns once all callbacks complete;
    /// the first listener error aborts notification and propagates.
    pub async fn register_sources(
        &self,
        provider: Arc<dyn SourceProvider>,
        batch: Vec<PotentialSource>,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        {
            let mut bindings = self.bindings.write().await;
            for source in &batch {
                let for_name = bindings.entry(source.identifier.name.clone()).or_default();
                for_name.retain(|b| b.source != *source);
                for_name.push(Binding {
                    source: source.clone(),
                    provider: provider.clone(),
                });
            }
        }
        debug!("registered {} source(s)", batch.len());

        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_sources_registered(&batch).await?;
        }
        Ok(())
    }

    /// Drops every binding for `identifier` and notifies listeners.
    pub async fn unregister_source(&self, identifier: &SourceIdentifier) {
        let removed: Vec<PotentialSource> = {
            let mut bindings = self.bindings.write().await;
            match bindings.get_mut(&identifier.name) {
                Some(for_name) => {
                    let mut gone = Vec::new();
                    for_name.retain(|b| {
                        if b.source.identifier == *identifier {
                            gone.push(b.source.clone());
                            false
                        } else {
                            true
                        }
                    });
                    if for_name.is_empty() {
                        bindings.remove(&identifier.name);
                    }
                    gone
                }
                None => Vec::new(),
            }
        };

        let listeners = self.listeners.read().await.clone();
        for source in removed {
            debug!("source {} unregistered", source.identifier);
            for listener in &listeners {
                listener.on_source_unregistered(&source).await;
            }
        }
    }

    /// Resolves one source to its raw bytes.
    ///
    /// With a revision, only the exact (name, revision) binding matches.
    /// Without one, the newest registered revision of the name wins and an
    /// unrevisioned binding is the fallback. Listeners observe a
    /// successful resolution via `on_source_encountered`.
    pub async fn resolve(
        &self,
        identifier: &SourceIdentifier,
        format: SourceFormat,
    ) -> std::result::Result<Vec<u8>, ResolveError> {
        let chosen = {
            let bindings = self.bindings.read().await;
            bindings.get(&identifier.name).and_then(|for_name| {
                let mut candidates = for_name.iter().filter(|b| b.source.format == format);
                let binding = match &identifier.revision {
                    Some(_) => {
                        candidates.find(|b| b.source.identifier.revision == identifier.revision)
                    }
                    // Option ordering puts None below any Some, so an
                    // unrevisioned binding only wins when nothing else exists.
                    None => candidates
                        .max_by(|a, b| a.source.identifier.revision.cmp(&b.source.identifier.revision)),
                };
                binding.map(|b| (b.source.identifier.clone(), b.provider.clone()))
            })
        };

        let Some((resolved, provider)) = chosen else {
            return Err(ResolveError::Unavailable(identifier.clone()));
        };

        let bytes = provider
            .read(&resolved)
            .await
            .map_err(|e| ResolveError::Provider {
                identifier: resolved.clone(),
                message: e.to_string(),
            })?;

        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_source_encountered(&resolved).await;
        }
        Ok(bytes)
    }

    /// Snapshot of every registered source, in identifier order.
    pub async fn registered_sources(&self) -> Vec<PotentialSource> {
        let bindings = self.bindings.read().await;
        let mut sources: Vec<PotentialSource> = bindings
            .values()
            .flat_map(|for_name| for_name.iter().map(|b| b.source.clone()))
            .collect();
        sources.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        sources
    }
}

impl Default for SharedSourceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed byte strings keyed by identifier.
    struct StaticProvider {
        content: HashMap<SourceIdentifier, Vec<u8>>,
    }

    impl StaticProvider {
        fn single(identifier: SourceIdentifier, body: &str) -> (Arc<Self>, PotentialSource) {
            let mut content = HashMap::new();
            content.insert(identifier.clone(), body.as_bytes().to_vec());
            (
                Arc::new(Self { content }),
                PotentialSource::text(identifier),
            )
        }
    }

    #[async_trait]
    impl SourceProvider for StaticProvider {
        async fn read(&self, identifier: &SourceIdentifier) -> Result<Vec<u8>> {
            self.content
                .get(identifier)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no content for {}", identifier))
        }
    }

    /// Records every notification it receives.
    #[derive(Default)]
    struct RecordingListener {
        registered: Mutex<Vec<Vec<PotentialSource>>>,
        encountered: Mutex<Vec<SourceIdentifier>>,
        unregistered: Mutex<Vec<PotentialSource>>,
    }

    #[async_trait]
    impl SourceListener for RecordingListener {
        async fn on_source_encountered(&self, identifier: &SourceIdentifier) {
            self.encountered.lock().unwrap().push(identifier.clone());
        }

        async fn on_sources_registered(&self, batch: &[PotentialSource]) -> Result<()> {
            self.registered.lock().unwrap().push(batch.to_vec());
            Ok(())
        }

        async fn on_source_unregistered(&self, source: &PotentialSource) {
            self.unregistered.lock().unwrap().push(source.clone());
        }
    }

    struct FailingListener;

    #[async_trait]
    impl SourceListener for FailingListener {
        async fn on_sources_registered(&self, _batch: &[PotentialSource]) -> Result<()> {
            anyhow::bail!("merge rejected")
        }
    }

    fn id(name: &str, revision: Option<&str>) -> SourceIdentifier {
        SourceIdentifier::new(name, revision.map(str::to_string))
    }

    #[tokio::test]
    async fn resolves_exact_revision() {
        let repo = SharedSourceRepository::new();
        let (provider, source) = StaticProvider::single(id("foo", Some("2020-01-01")), "module foo;");
        repo.register_sources(provider, vec![source]).await.unwrap();

        let bytes = repo
            .resolve(&id("foo", Some("2020-01-01")), SourceFormat::Text)
            .await
            .unwrap();
        assert_eq!(bytes, b"module foo;");
    }

    #[tokio::test]
    async fn unrevisioned_request_picks_newest_revision() {
        let repo = SharedSourceRepository::new();
        let mut content = HashMap::new();
        content.insert(id("foo", None), b"bare".to_vec());
        content.insert(id("foo", Some("2019-06-01")), b"old".to_vec());
        content.insert(id("foo", Some("2020-01-01")), b"new".to_vec());
        let provider = Arc::new(StaticProvider { content });
        let batch = vec![
            PotentialSource::text(id("foo", None)),
            PotentialSource::text(id("foo", Some("2019-06-01"))),
            PotentialSource::text(id("foo", Some("2020-01-01"))),
        ];
        repo.register_sources(provider, batch).await.unwrap();

        let bytes = repo.resolve(&id("foo", None), SourceFormat::Text).await.unwrap();
        assert_eq!(bytes, b"new");
    }

    #[tokio::test]
    async fn missing_source_is_unavailable() {
        let repo = SharedSourceRepository::new();
        let err = repo
            .resolve(&id("bar", Some("2020-01-01")), SourceFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_)));
    }

    #[tokio::test]
    async fn format_mismatch_is_unavailable() {
        let repo = SharedSourceRepository::new();
        let (provider, source) = StaticProvider::single(id("foo", None), "module foo;");
        repo.register_sources(provider, vec![source]).await.unwrap();

        let err = repo.resolve(&id("foo", None), SourceFormat::Ast).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_)));
    }

    #[tokio::test]
    async fn listeners_see_registration_and_resolution() {
        let repo = SharedSourceRepository::new();
        let listener = Arc::new(RecordingListener::default());
        repo.register_listener(listener.clone()).await.unwrap();

        let (provider, source) = StaticProvider::single(id("foo", None), "module foo;");
        repo.register_sources(provider, vec![source.clone()]).await.unwrap();
        // Notification happened before register_sources returned.
        assert_eq!(*listener.registered.lock().unwrap(), vec![vec![source]]);

        repo.resolve(&id("foo", None), SourceFormat::Text).await.unwrap();
        assert_eq!(*listener.encountered.lock().unwrap(), vec![id("foo", None)]);
    }

    #[tokio::test]
    async fn late_listener_gets_one_replay_batch() {
        let repo = SharedSourceRepository::new();
        let (provider, source) = StaticProvider::single(id("foo", Some("2020-01-01")), "x");
        repo.register_sources(provider, vec![source.clone()]).await.unwrap();

        let listener = Arc::new(RecordingListener::default());
        repo.register_listener(listener.clone()).await.unwrap();

        let batches = listener.registered.lock().unwrap().clone();
        assert_eq!(batches, vec![vec![source]]);
    }

    #[tokio::test]
    async fn listener_failure_propagates_to_registration() {
        let repo = SharedSourceRepository::new();
        repo.register_listener(Arc::new(FailingListener)).await.unwrap();

        let (provider, source) = StaticProvider::single(id("foo", None), "x");
        let err = repo.register_sources(provider, vec![source]).await.unwrap_err();
        assert!(err.to_string().contains("merge rejected"));
    }

    #[tokio::test]
    async fn unregister_removes_resolution_and_notifies() {
        let repo = SharedSourceRepository::new();
        let listener = Arc::new(RecordingListener::default());
        repo.register_listener(listener.clone()).await.unwrap();

        let (provider, source) = StaticProvider::single(id("foo", None), "x");
        repo.register_sources(provider, vec![source.clone()]).await.unwrap();

        repo.unregister_source(&id("foo", None)).await;
        assert_eq!(*listener.unregistered.lock().unwrap(), vec![source]);

        let err = repo.resolve(&id("foo", None), SourceFormat::Text).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_)));
    }

    #[tokio::test]
    async fn reregistration_replaces_provider() {
        let repo = SharedSourceRepository::new();
        let (first, source) = StaticProvider::single(id("foo", None), "first");
        repo.register_sources(first, vec![source.clone()]).await.unwrap();
        let (second, _) = StaticProvider::single(id("foo", None), "second");
        repo.register_sources(second, vec![source]).await.unwrap();

        let bytes = repo.resolve(&id("foo", None), SourceFormat::Text).await.unwrap();
        assert_eq!(bytes, b"second");
        assert_eq!(repo.registered_sources().await.len(), 1);
    }
}
