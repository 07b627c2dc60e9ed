//! Row storage behind local providers.

use std::sync::Arc;

use async_trait::async_trait;

use super::BackendKind;
use crate::entity::ResourceState;
use crate::error::StorageResult;
use crate::tenant::RequestContext;
use crate::types::StoredResource;

/// Tenant-scoped row storage for entities of any kind.
///
/// Stores know nothing about entity types: they keep the full JSON form of an
/// entity next to the columns providers filter on. Every operation is scoped
/// to `ctx.tenant_id()`; there is no way to reach another tenant's rows.
///
/// # Concurrency
///
/// [`replace`](Self::replace) is a compare-and-set on the revision token the
/// caller last saw. Of two writers that read the same revision, exactly one
/// succeeds and the other gets a revision conflict.
///
/// # Example
///
/// ```ignore
/// use tessera_persistence::provider::EntityStore;
///
/// async fn bump<S: EntityStore>(store: &S, ctx: &RequestContext) -> StorageResult<()> {
///     let row = store.fetch(ctx, "content", "c1").await?.expect("row");
///     let expected = row.revision().map(str::to_string);
///     let next = /* the same row with a new revision and data */;
///     store.replace(ctx, &next, expected.as_deref()).await
/// }
/// ```
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Which kind of store this is.
    fn backend_kind(&self) -> BackendKind;

    /// Reads one row in any state.
    ///
    /// # Returns
    ///
    /// The row, or `None` if the tenant has no row with this kind and id.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        kind: &str,
        id: &str,
    ) -> StorageResult<Option<StoredResource>>;

    /// Reads every row of a kind in storage order, optionally restricted to a
    /// state.
    ///
    /// This is O(rows of the kind in the tenant); prefer
    /// [`scan_page`](Self::scan_page) when no row needs to be inspected.
    async fn scan(
        &self,
        ctx: &RequestContext,
        kind: &str,
        state: Option<ResourceState>,
    ) -> StorageResult<Vec<StoredResource>>;

    /// Writes a new row.
    ///
    /// # Errors
    ///
    /// * `ResourceError::Key` - If the tenant already has a row with this kind and id
    async fn insert(&self, ctx: &RequestContext, row: &StoredResource) -> StorageResult<()>;

    /// Overwrites an existing row if its revision still equals `expected`.
    ///
    /// # Errors
    ///
    /// * `ConcurrencyError::RevisionConflict` - If the stored revision differs
    /// * `ResourceError::NotFound` - If the row does not exist
    async fn replace(
        &self,
        ctx: &RequestContext,
        row: &StoredResource,
        expected: Option<&str>,
    ) -> StorageResult<()>;

    /// Number of rows of a kind, in any state.
    async fn count(&self, ctx: &RequestContext, kind: &str) -> StorageResult<u64> {
        Ok(self.scan(ctx, kind, None).await?.len() as u64)
    }

    /// Reads at most `limit` rows of a kind in `state`, in storage order,
    /// after skipping `offset` of them.
    ///
    /// Returns the page and the number of rows in `state` before paging.
    async fn scan_page(
        &self,
        ctx: &RequestContext,
        kind: &str,
        state: ResourceState,
        offset: u32,
        limit: u32,
    ) -> StorageResult<(Vec<StoredResource>, u64)> {
        let rows = self.scan(ctx, kind, Some(state)).await?;
        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    fn backend_kind(&self) -> BackendKind {
        (**self).backend_kind()
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        kind: &str,
        id: &str,
    ) -> StorageResult<Option<StoredResource>> {
        (**self).fetch(ctx, kind, id).await
    }

    async fn scan(
        &self,
        ctx: &RequestContext,
        kind: &str,
        state: Option<ResourceState>,
    ) -> StorageResult<Vec<StoredResource>> {
        (**self).scan(ctx, kind, state).await
    }

    async fn insert(&self, ctx: &RequestContext, row: &StoredResource) -> StorageResult<()> {
        (**self).insert(ctx, row).await
    }

    async fn replace(
        &self,
        ctx: &RequestContext,
        row: &StoredResource,
        expected: Option<&str>,
    ) -> StorageResult<()> {
        (**self).replace(ctx, row, expected).await
    }

    async fn count(&self, ctx: &RequestContext, kind: &str) -> StorageResult<u64> {
        (**self).count(ctx, kind).await
    }

    async fn scan_page(
        &self,
        ctx: &RequestContext,
        kind: &str,
        state: ResourceState,
        offset: u32,
        limit: u32,
    ) -> StorageResult<(Vec<StoredResource>, u64)> {
        (**self).scan_page(ctx, kind, state, offset, limit).await
    }
}
