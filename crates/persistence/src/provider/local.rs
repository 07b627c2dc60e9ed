//! Providers backed by a local [`EntityStore`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{BackendKind, EntityStore, Provider};
use crate::entity::{Projection, Resource, ResourceState, normalize_id};
use crate::error::StorageResult;
use crate::query::{QueryArgs, QueryOrder, QueryPredication};
use crate::result::{ChangeMethod, ChangingResultInfo, ErrorKind};
use crate::tenant::{Operation, RequestContext};
use crate::types::{Page, StoredResource};

/// A provider that evaluates queries in process over rows read from a store.
///
/// Several providers may share one store; rows are partitioned by
/// [`Resource::KIND`].
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "sqlite")]
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use tessera_persistence::backends::sqlite::SqliteStore;
/// use tessera_persistence::entities::User;
/// use tessera_persistence::provider::{LocalProvider, Provider};
/// use tessera_persistence::tenant::RequestContext;
///
/// let store = Arc::new(SqliteStore::in_memory()?);
/// let users = LocalProvider::<User, _>::new(store);
/// let ctx = RequestContext::builder().tenant_id("acme").build()?;
///
/// let mut ada = User::new("ada");
/// let result = users.save(&ctx, &mut ada).await;
/// assert!(result.is_successful());
/// # Ok(())
/// # }
/// ```
pub struct LocalProvider<E: Resource, S: EntityStore> {
    store: Arc<S>,
    predication: QueryPredication<E>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Resource, S: EntityStore> LocalProvider<E, S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            predication: E::predication(),
            _kind: PhantomData,
        }
    }

    /// Replaces the query predicates of the kind.
    pub fn with_predication(mut self, predication: QueryPredication<E>) -> Self {
        self.predication = predication;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn predication(&self) -> &QueryPredication<E> {
        &self.predication
    }

    /// Reads every row in `state` as slim entities, in storage order.
    pub(crate) async fn load_all(
        &self,
        ctx: &RequestContext,
        state: ResourceState,
    ) -> StorageResult<Vec<E>> {
        let rows = ctx
            .run("search", self.store.scan(ctx, E::KIND, Some(state)))
            .await?;
        rows.into_iter()
            .map(|row| row.into_entity::<E>(Projection::Slim))
            .collect()
    }

    /// Whether `args` selects rows by state alone, in storage order.
    fn is_storage_order_page(&self, args: &QueryArgs) -> bool {
        args.order == QueryOrder::Default
            && args.name_query.as_deref().is_none_or(str::is_empty)
            && !args.data.keys().any(|key| self.predication.contains(key))
    }

    async fn try_save(
        &self,
        ctx: &RequestContext,
        entity: &mut E,
    ) -> StorageResult<ChangingResultInfo> {
        let id = entity.entity().id().to_string();
        let existing = ctx.run("save", self.store.fetch(ctx, E::KIND, &id)).await?;

        let operation = if existing.is_some() {
            Operation::Update
        } else {
            Operation::Create
        };
        ctx.authorize(operation, E::KIND)?;

        if existing.is_some() && !entity.entity().has_changes() {
            debug!(kind = E::KIND, id = %id, "nothing to save");
            return Ok(ChangingResultInfo::unchanged());
        }

        entity.validate()?;

        if E::IMMUTABLE && existing.is_some() {
            return Ok(ChangingResultInfo::invalid(
                ErrorKind::Conflict,
                format!("stored {} entities cannot be modified: {id}", E::KIND),
            ));
        }

        let expected = entity.entity().revision().map(str::to_string);
        let previous_state = existing.as_ref().map(StoredResource::state);

        entity.entity_mut().prepare_for_saving();
        let written = match StoredResource::from_entity(entity) {
            Ok(row) => {
                ctx.run("save", async {
                    if existing.is_some() {
                        self.store.replace(ctx, &row, expected.as_deref()).await
                    } else {
                        self.store.insert(ctx, &row).await
                    }
                })
                .await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = written {
            entity.entity_mut().rollback_saving();
            warn!(
                kind = E::KIND,
                id = %id,
                tenant = %ctx.tenant_id(),
                error = %err,
                "save failed, revision rolled back"
            );
            return Err(err);
        }
        entity.entity_mut().commit_saving();

        let method = match previous_state {
            None => ChangeMethod::Add,
            Some(previous)
                if previous != ResourceState::Deleted
                    && entity.entity().state() == ResourceState::Deleted =>
            {
                ChangeMethod::Remove
            }
            Some(_) => E::UPDATE_METHOD,
        };
        debug!(kind = E::KIND, id = %id, method = %method, "saved entity");
        Ok(ChangingResultInfo::new(method))
    }
}

#[async_trait]
impl<E: Resource, S: EntityStore + 'static> Provider<E> for LocalProvider<E, S> {
    fn backend_kind(&self) -> BackendKind {
        self.store.backend_kind()
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        id: &str,
        include_all_states: bool,
    ) -> StorageResult<Option<E>> {
        ctx.authorize(Operation::Read, E::KIND)?;
        let id = normalize_id(id);
        let row = ctx.run("get", self.store.fetch(ctx, E::KIND, &id)).await?;
        debug!(kind = E::KIND, id = %id, found = row.is_some(), "get");

        match row {
            Some(row) if include_all_states || row.state() == ResourceState::Normal => {
                Ok(Some(row.into_entity(Projection::Full)?))
            }
            _ => Ok(None),
        }
    }

    /// Runs the query over the store.
    ///
    /// A query with no name filter, no kind predicate and the default order
    /// is paged by the store. Anything else reads every row of the kind in
    /// the requested state and filters, orders and pages in memory, so its
    /// cost grows with the number of such rows in the tenant.
    async fn search(&self, ctx: &RequestContext, args: &QueryArgs) -> StorageResult<Page<E>> {
        ctx.authorize(Operation::Search, E::KIND)?;
        let page = if self.is_storage_order_page(args) {
            let (rows, total) = ctx
                .run(
                    "search",
                    self.store
                        .scan_page(ctx, E::KIND, args.state, args.offset, args.count),
                )
                .await?;
            let items = rows
                .into_iter()
                .map(|row| row.into_entity::<E>(Projection::Slim))
                .collect::<StorageResult<Vec<_>>>()?;
            Page::new(args.offset, items).with_total(total)
        } else {
            let items = self.load_all(ctx, args.state).await?;
            self.predication.apply(args, items)
        };
        debug!(
            kind = E::KIND,
            tenant = %ctx.tenant_id(),
            returned = page.len(),
            total = page.total.unwrap_or_default(),
            "search"
        );
        Ok(page)
    }

    async fn save(&self, ctx: &RequestContext, entity: &mut E) -> ChangingResultInfo {
        match self.try_save(ctx, entity).await {
            Ok(result) => result,
            Err(err) => ChangingResultInfo::from_error(&err),
        }
    }
}

impl<E: Resource, S: EntityStore> Clone for LocalProvider<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            predication: self.predication.clone(),
            _kind: PhantomData,
        }
    }
}

impl<E: Resource, S: EntityStore> fmt::Debug for LocalProvider<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProvider")
            .field("kind", &E::KIND)
            .field("backend", &self.store.backend_kind())
            .field("predication", &self.predication)
            .finish()
    }
}
