//! Persisted catalog storage.
//!
//! The [`CatalogStore`] trait is the seam between the catalog
//! synchronizer and the persistence backend: a single atomic
//! `merge(version_id, entries)` write plus a read used by the CLI and the
//! `/catalog` endpoint. The merge is additive: entries outside the
//! merged batch are never touched, and a concurrent reader sees either
//! the catalog before the batch or after it, never a partial batch.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::Mutex;

use crate::models::{Catalog, CatalogEntry};

/// Abstract catalog backend.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Atomically merge `entries` into the catalog and stamp `version_id`
    /// as the new module set version. Union is keyed by (name, revision).
    async fn merge(&self, version_id: &str, entries: &[CatalogEntry]) -> Result<()>;

    /// Load the full catalog; `None` before the first merge.
    async fn load(&self) -> Result<Option<Catalog>>;
}

/// SQLite-backed catalog store. One transaction per merge.
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn merge(&self, version_id: &str, entries: &[CatalogEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO catalog (id, module_set_id) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET module_set_id = excluded.module_set_id",
        )
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO modules (name, revision, schema_url) VALUES (?, ?, ?)
                 ON CONFLICT(name, revision) DO UPDATE SET schema_url = excluded.schema_url",
            )
            .bind(&entry.name)
            .bind(&entry.revision)
            .bind(&entry.schema_url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Catalog>> {
        let version: Option<String> =
            sqlx::query_scalar("SELECT module_set_id FROM catalog WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        let Some(module_set_id) = version else {
            return Ok(None);
        };

        let rows = sqlx::query("SELECT name, revision, schema_url FROM modules ORDER BY name, revision")
            .fetch_all(&self.pool)
            .await?;
        let modules = rows
            .iter()
            .map(|row| CatalogEntry {
                name: row.get("name"),
                revision: row.get("revision"),
                schema_url: row.get("schema_url"),
            })
            .collect();

        Ok(Some(Catalog {
            module_set_id,
            modules,
        }))
    }
}

/// In-memory catalog store for tests.
pub struct MemoryCatalogStore {
    inner: Mutex<Option<MemoryCatalog>>,
}

struct MemoryCatalog {
    module_set_id: String,
    modules: BTreeMap<(String, String), CatalogEntry>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn merge(&self, version_id: &str, entries: &[CatalogEntry]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let catalog = inner.get_or_insert_with(|| MemoryCatalog {
            module_set_id: String::new(),
            modules: BTreeMap::new(),
        });
        catalog.module_set_id = version_id.to_string();
        for entry in entries {
            catalog
                .modules
                .insert((entry.name.clone(), entry.revision.clone()), entry.clone());
        }
        Ok(())
    }

    async fn load(&self) -> Result<Option<Catalog>> {
        let inner = self.inner.lock().await;
        Ok(inner.as_ref().map(|catalog| Catalog {
            module_set_id: catalog.module_set_id.clone(),
            modules: catalog.modules.values().cloned().collect(),
        }))
    }
}
