//! Routing facade for logging generated names.
//!
//! The storage strategy is chosen once, at construction, from
//! configuration: the relational store when it is enabled and a pool is
//! available, otherwise the legacy flat file. Callers see one uniform
//! interface and a [`LogOutcome`] instead of raw errors.

use std::sync::Arc;

use async_trait::async_trait;
use namelog_core::audit::{AuditContext, RequestContext};
use namelog_core::generated_name::GeneratedName;
use namelog_core::paging::{clamp_page, clamp_page_size, page_offset, PagedResult};
use namelog_core::types::DbId;
use namelog_db::models::generated_name::{CreateGeneratedName, GeneratedNameFilter};
use namelog_db::repositories::GeneratedNameRepo;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::config::StorageConfig;
use crate::error::ServiceResult;
use crate::legacy_store::LegacyNameStore;

/// Which backend a [`GeneratedNamesService`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Database,
    LegacyFile,
}

/// Result of a logging request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogOutcome {
    pub success: bool,
    /// Identity assigned by the store.
    pub id: Option<DbId>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Storage strategies
// ---------------------------------------------------------------------------

/// A place generated names can be written to and listed from.
#[async_trait]
pub trait NameLogStore: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Persist `name` and return the identity assigned to it.
    async fn write(
        &self,
        name: &GeneratedName,
        request: Option<&dyn RequestContext>,
    ) -> ServiceResult<DbId>;

    /// One page of names, newest first.
    async fn page(
        &self,
        page: i64,
        page_size: i64,
        filter: Option<&GeneratedNameFilter>,
    ) -> ServiceResult<PagedResult<GeneratedName>>;

    async fn get(&self, id: DbId) -> ServiceResult<Option<GeneratedName>>;

    /// Permanently remove a name. Returns `false` if it was not found.
    async fn delete(&self, id: DbId) -> ServiceResult<bool>;

    /// Permanently remove every name. Returns how many were removed.
    async fn delete_all(&self) -> ServiceResult<u64>;

    /// Replace the whole collection with `names`, renumbered `1..=N` in
    /// input order. Nothing is changed if any name is invalid.
    async fn replace_all(&self, names: &[GeneratedName]) -> ServiceResult<Vec<GeneratedName>>;
}

/// Relational storage through [`GeneratedNameRepo`], with request audit fields.
pub struct DatabaseNameStore {
    pool: PgPool,
}

impl DatabaseNameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NameLogStore for DatabaseNameStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Database
    }

    async fn write(
        &self,
        name: &GeneratedName,
        request: Option<&dyn RequestContext>,
    ) -> ServiceResult<DbId> {
        name.validate()?;

        let audit = AuditContext::capture(request);
        let input = CreateGeneratedName {
            ip_address: audit.ip_address,
            user_agent: audit.user_agent,
            session_id: audit.session_id,
            request_id: audit.request_id,
            created_by: Some(name.user.clone()),
            ..CreateGeneratedName::from_generated_name(name)
        };

        let record = GeneratedNameRepo::create(&self.pool, &input).await?;
        Ok(record.id)
    }

    async fn page(
        &self,
        page: i64,
        page_size: i64,
        filter: Option<&GeneratedNameFilter>,
    ) -> ServiceResult<PagedResult<GeneratedName>> {
        let result = GeneratedNameRepo::get_paged(&self.pool, page, page_size, filter).await?;
        Ok(result.map(|record| record.to_generated_name()))
    }

    async fn get(&self, id: DbId) -> ServiceResult<Option<GeneratedName>> {
        let record = GeneratedNameRepo::get_by_id(&self.pool, id).await?;
        Ok(record.map(|r| r.to_generated_name()))
    }

    async fn delete(&self, id: DbId) -> ServiceResult<bool> {
        Ok(GeneratedNameRepo::delete(&self.pool, id).await?)
    }

    async fn delete_all(&self) -> ServiceResult<u64> {
        Ok(GeneratedNameRepo::delete_all(&self.pool).await?)
    }

    async fn replace_all(&self, names: &[GeneratedName]) -> ServiceResult<Vec<GeneratedName>> {
        let mut inputs = Vec::with_capacity(names.len());
        for name in names {
            name.validate()?;
            inputs.push(CreateGeneratedName {
                created_by: Some(name.user.clone()),
                ..CreateGeneratedName::from_generated_name(name)
            });
        }

        let records = GeneratedNameRepo::replace_all(&self.pool, &inputs).await?;
        Ok(records.iter().map(|r| r.to_generated_name()).collect())
    }
}

/// Legacy flat-file storage. Every write rereads and rewrites the whole file,
/// so writes are serialized by a mutex.
pub struct LegacyFileNameStore {
    file: LegacyNameStore,
    write_lock: Mutex<()>,
}

impl LegacyFileNameStore {
    pub fn new(file: LegacyNameStore) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    /// Every name in the file, newest first.
    async fn read_sorted(&self) -> ServiceResult<Vec<GeneratedName>> {
        let mut names = self.file.read_all().await?;
        names.sort_by(|a, b| {
            b.created_on
                .cmp(&a.created_on)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(names)
    }
}

#[async_trait]
impl NameLogStore for LegacyFileNameStore {
    fn kind(&self) -> StorageKind {
        StorageKind::LegacyFile
    }

    /// Appends with identity `max(existing ids) + 1` (1 for an empty file).
    /// Request audit fields have no place in the legacy format.
    async fn write(
        &self,
        name: &GeneratedName,
        _request: Option<&dyn RequestContext>,
    ) -> ServiceResult<DbId> {
        let _guard = self.write_lock.lock().await;

        let mut names = self.file.read_all().await?;
        let id = names.iter().map(|n| n.id).max().map_or(1, |max| max + 1);
        names.push(GeneratedName {
            id,
            ..name.clone()
        });
        self.file.write_all(&names).await?;
        Ok(id)
    }

    /// Filters are not supported on the legacy file and are ignored.
    async fn page(
        &self,
        page: i64,
        page_size: i64,
        filter: Option<&GeneratedNameFilter>,
    ) -> ServiceResult<PagedResult<GeneratedName>> {
        if filter.is_some_and(GeneratedNameFilter::has_filters) {
            tracing::debug!("Filters are ignored on legacy file storage");
        }
        let page = clamp_page(page);
        let page_size = clamp_page_size(page_size);
        let names = self.read_sorted().await?;
        let total_count = names.len() as i64;

        let items = names
            .into_iter()
            .skip(usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX))
            .take(page_size as usize)
            .collect();

        Ok(PagedResult {
            items,
            total_count,
            page,
            page_size,
        })
    }

    async fn get(&self, id: DbId) -> ServiceResult<Option<GeneratedName>> {
        Ok(self.file.read_all().await?.into_iter().find(|n| n.id == id))
    }

    async fn delete(&self, id: DbId) -> ServiceResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut names = self.file.read_all().await?;
        let before = names.len();
        names.retain(|n| n.id != id);
        if names.len() == before {
            return Ok(false);
        }
        self.file.write_all(&names).await?;
        Ok(true)
    }

    async fn delete_all(&self) -> ServiceResult<u64> {
        let _guard = self.write_lock.lock().await;

        let removed = match self.file.count().await {
            Ok(count) => count as u64,
            Err(e) => {
                tracing::warn!(error = %e, "Legacy file unreadable; clearing it anyway");
                0
            }
        };
        self.file.write_all(&[]).await?;
        Ok(removed)
    }

    async fn replace_all(&self, names: &[GeneratedName]) -> ServiceResult<Vec<GeneratedName>> {
        for name in names {
            name.validate()?;
        }
        let renumbered: Vec<GeneratedName> = (1..)
            .zip(names)
            .map(|(id, name)| GeneratedName {
                id,
                ..name.clone()
            })
            .collect();

        let _guard = self.write_lock.lock().await;
        self.file.write_all(&renumbered).await?;
        Ok(renumbered)
    }
}

// ---------------------------------------------------------------------------
// GeneratedNamesService
// ---------------------------------------------------------------------------

/// Entry point for logging and listing generated names.
#[derive(Clone)]
pub struct GeneratedNamesService {
    store: Arc<dyn NameLogStore>,
}

impl GeneratedNamesService {
    pub fn new(store: Arc<dyn NameLogStore>) -> Self {
        Self { store }
    }

    /// Pick the storage strategy from configuration. Relational storage is
    /// used only when it is enabled and `pool` is available.
    pub fn from_config(config: &StorageConfig, pool: Option<PgPool>) -> Self {
        let store: Arc<dyn NameLogStore> = match pool {
            Some(pool) if config.use_database => Arc::new(DatabaseNameStore::new(pool)),
            _ => {
                if config.use_database {
                    tracing::warn!(
                        "Database storage requested but no pool is available; using the legacy file"
                    );
                }
                Arc::new(LegacyFileNameStore::new(LegacyNameStore::from_config(config)))
            }
        };
        Self::new(store)
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.store.kind()
    }

    /// Persist `name`, copying the assigned identity back onto it.
    ///
    /// Failures are logged and reported through the outcome, never returned.
    pub async fn log_generated_name(
        &self,
        name: &mut GeneratedName,
        request: Option<&dyn RequestContext>,
    ) -> LogOutcome {
        match self.store.write(name, request).await {
            Ok(id) => {
                name.id = id;
                tracing::info!(
                    id,
                    resource_name = %name.resource_name,
                    user = %name.user,
                    storage = ?self.store.kind(),
                    "Logged generated name"
                );
                LogOutcome {
                    success: true,
                    id: Some(id),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(
                    resource_name = %name.resource_name,
                    error = %e,
                    "Failed to log generated name"
                );
                LogOutcome {
                    success: false,
                    id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// One page of logged names, newest first. `filter` applies to relational
    /// storage only.
    pub async fn get_paged_items(
        &self,
        page: i64,
        page_size: i64,
        filter: Option<&GeneratedNameFilter>,
    ) -> ServiceResult<PagedResult<GeneratedName>> {
        self.store
            .page(page, page_size, filter)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to get paged generated names"))
    }

    pub async fn get_item(&self, id: DbId) -> ServiceResult<Option<GeneratedName>> {
        self.store.get(id).await
    }

    pub async fn delete_item(&self, id: DbId) -> ServiceResult<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            tracing::info!(id, storage = ?self.store.kind(), "Deleted generated name");
        }
        Ok(deleted)
    }

    /// Remove every logged name.
    pub async fn delete_all_items(&self) -> ServiceResult<u64> {
        let deleted = self
            .store
            .delete_all()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to delete all generated names"))?;
        tracing::info!(deleted, storage = ?self.store.kind(), "Deleted all generated names");
        Ok(deleted)
    }

    /// Replace the whole collection with `names`. Identities are reassigned
    /// `1..=N` in input order; the stored names are returned.
    pub async fn replace_items(
        &self,
        names: &[GeneratedName],
    ) -> ServiceResult<Vec<GeneratedName>> {
        let stored = self
            .store
            .replace_all(names)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to replace generated names"))?;
        tracing::info!(
            count = stored.len(),
            storage = ?self.store.kind(),
            "Replaced generated names"
        );
        Ok(stored)
    }
}
