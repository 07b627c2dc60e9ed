//! Revision history.
//!
//! A [`Versioned`] kind can snapshot itself into a [`Revision`]: an immutable
//! entity of its own kind that points back at its source by id. Revisions are
//! stored and searched like any other entity; [`RevisionHistory`] adds the
//! lookup by source, and [`RevisioningService`] ties saving an entity to
//! recording its history.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::entity::{Resource, normalize_id};
use crate::error::{ResourceError, StorageError, StorageResult};
use crate::provider::{EntityStore, LocalProvider, Provider};
use crate::query::QueryArgs;
use crate::result::{ChangeMethod, ChangingResultInfo};
use crate::tenant::{Operation, RequestContext};
use crate::types::Page;

/// Query key that selects revisions by source id.
pub const SOURCE_KEY: &str = "source";

/// An immutable snapshot of another entity.
///
/// The kind's predication must understand the [`SOURCE_KEY`] query key.
pub trait Revision: Resource {
    /// Id of the entity this revision was taken from.
    fn source_id(&self) -> &str;

    fn message(&self) -> &str;
}

/// A kind whose state can be recorded as revisions and restored from them.
pub trait Versioned: Resource {
    type Revision: Revision;

    /// Builds a new, unsaved revision holding the current content.
    ///
    /// The revision gets its own id and revision token; `self` is not
    /// modified.
    fn create_revision(&self, message: impl Into<String>) -> Self::Revision;

    /// Copies the content of `revision` back, recording each changed field.
    fn restore_from(&mut self, revision: &Self::Revision);
}

/// Providers that can list revisions by source.
#[async_trait]
pub trait RevisionHistory<R: Revision>: Provider<R> {
    /// Revisions of `source_id`, filtered, ordered and paged by `args`.
    async fn list_revisions(
        &self,
        ctx: &RequestContext,
        source_id: &str,
        args: &QueryArgs,
    ) -> StorageResult<Page<R>>;
}

#[async_trait]
impl<R: Revision, S: EntityStore + 'static> RevisionHistory<R> for LocalProvider<R, S> {
    async fn list_revisions(
        &self,
        ctx: &RequestContext,
        source_id: &str,
        args: &QueryArgs,
    ) -> StorageResult<Page<R>> {
        let args = args.clone().with_data(SOURCE_KEY, normalize_id(source_id));
        self.search(ctx, &args).await
    }
}

/// Saves versioned entities together with their history.
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "sqlite")]
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use tessera_persistence::backends::sqlite::SqliteStore;
/// use tessera_persistence::Resource;
/// use tessera_persistence::entities::{Content, ContentRevision};
/// use tessera_persistence::provider::LocalProvider;
/// use tessera_persistence::query::QueryArgs;
/// use tessera_persistence::revision::RevisioningService;
/// use tessera_persistence::tenant::RequestContext;
///
/// let store = Arc::new(SqliteStore::in_memory()?);
/// let service = RevisioningService::new(
///     Arc::new(LocalProvider::<Content, _>::new(store.clone())),
///     Arc::new(LocalProvider::<ContentRevision, _>::new(store)),
/// );
/// let ctx = RequestContext::builder().tenant_id("acme").build()?;
///
/// let mut article = Content::new("hello");
/// service.save(&ctx, &mut article, "first draft").await;
/// let history = service
///     .revisions(&ctx, article.entity().id(), &QueryArgs::new())
///     .await?;
/// assert_eq!(history.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct RevisioningService<E: Versioned> {
    entities: Arc<dyn Provider<E>>,
    revisions: Arc<dyn RevisionHistory<E::Revision>>,
}

impl<E: Versioned> Clone for RevisioningService<E> {
    fn clone(&self) -> Self {
        Self {
            entities: Arc::clone(&self.entities),
            revisions: Arc::clone(&self.revisions),
        }
    }
}

impl<E: Versioned> RevisioningService<E> {
    pub fn new(
        entities: Arc<dyn Provider<E>>,
        revisions: Arc<dyn RevisionHistory<E::Revision>>,
    ) -> Self {
        Self {
            entities,
            revisions,
        }
    }

    pub fn entities(&self) -> &Arc<dyn Provider<E>> {
        &self.entities
    }

    pub fn history(&self) -> &Arc<dyn RevisionHistory<E::Revision>> {
        &self.revisions
    }

    /// Saves `entity` and records a revision of the saved content.
    ///
    /// The caller must be allowed to create revisions, and the revision must
    /// validate, before the entity is written. No revision is recorded when
    /// the save fails or changes nothing. If the entity is saved but writing
    /// its revision still fails, the entity's result is returned with a
    /// message naming the lost revision.
    pub async fn save(
        &self,
        ctx: &RequestContext,
        entity: &mut E,
        message: impl Into<String> + Send,
    ) -> ChangingResultInfo {
        let message = message.into();
        let revision_kind = <E::Revision as Resource>::KIND;
        if let Err(err) = ctx.authorize(Operation::Create, revision_kind) {
            return ChangingResultInfo::from_error(&err.into());
        }
        if let Err(err) = entity.create_revision(message.clone()).validate() {
            return ChangingResultInfo::from_error(&err.into());
        }

        let result = self.entities.save(ctx, entity).await;
        if !matches!(
            result.method(),
            ChangeMethod::Add | ChangeMethod::Update | ChangeMethod::MemberModify
        ) {
            return result;
        }

        let mut revision = entity.create_revision(message);
        let recorded = self.revisions.save(ctx, &mut revision).await;
        if !recorded.is_successful() {
            warn!(
                kind = E::KIND,
                id = %entity.entity().id(),
                code = %recorded.error_kind(),
                "entity saved but its revision was not"
            );
            let reason = recorded
                .message()
                .map_or_else(|| recorded.error_kind().to_string(), str::to_string);
            return result.with_message(format!(
                "saved, but the {revision_kind} was not recorded ({}): {reason}",
                recorded.error_kind()
            ));
        }
        debug!(
            kind = E::KIND,
            id = %entity.entity().id(),
            revision = %revision.entity().id(),
            "recorded revision"
        );
        result
    }

    /// Revisions of `source_id`.
    pub async fn revisions(
        &self,
        ctx: &RequestContext,
        source_id: &str,
        args: &QueryArgs,
    ) -> StorageResult<Page<E::Revision>> {
        self.revisions.list_revisions(ctx, source_id, args).await
    }

    /// Restores `source_id` to the content of one of its revisions and saves
    /// the result as a new revision.
    pub async fn revert_to(
        &self,
        ctx: &RequestContext,
        source_id: &str,
        revision_id: &str,
        message: impl Into<String> + Send,
    ) -> ChangingResultInfo {
        let source_id = normalize_id(source_id);
        let revision = match self.revisions.get(ctx, revision_id, false).await {
            Ok(Some(revision)) if revision.source_id() == source_id => revision,
            Ok(_) => {
                let err: StorageError = ResourceError::not_found(
                    <E::Revision as Resource>::KIND,
                    &normalize_id(revision_id),
                )
                .into();
                return ChangingResultInfo::from_error(&err);
            }
            Err(err) => return ChangingResultInfo::from_error(&err),
        };
        let mut entity = match self.entities.get(ctx, &source_id, true).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                let err: StorageError = ResourceError::not_found(E::KIND, &source_id).into();
                return ChangingResultInfo::from_error(&err);
            }
            Err(err) => return ChangingResultInfo::from_error(&err),
        };

        entity.restore_from(&revision);
        self.save(ctx, &mut entity, message).await
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::sqlite::SqliteStore;
    use crate::entities::{Content, ContentRevision};
    use crate::provider::BackendKind;
    use crate::query::QueryOrder;
    use crate::result::ErrorKind;
    use crate::tenant::TenantPermissions;

    /// A history whose writes are always turned away.
    struct BusyHistory;

    #[async_trait]
    impl Provider<ContentRevision> for BusyHistory {
        fn backend_kind(&self) -> BackendKind {
            BackendKind::Custom("busy")
        }

        async fn get(
            &self,
            _ctx: &RequestContext,
            _id: &str,
            _include_all_states: bool,
        ) -> StorageResult<Option<ContentRevision>> {
            Ok(None)
        }

        async fn search(
            &self,
            _ctx: &RequestContext,
            _args: &QueryArgs,
        ) -> StorageResult<Page<ContentRevision>> {
            Ok(Page::empty())
        }

        async fn save(&self, _ctx: &RequestContext, _entity: &mut ContentRevision) -> ChangingResultInfo {
            ChangingResultInfo::invalid(ErrorKind::Busy, "history is read-only right now")
        }
    }

    #[async_trait]
    impl RevisionHistory<ContentRevision> for BusyHistory {
        async fn list_revisions(
            &self,
            _ctx: &RequestContext,
            _source_id: &str,
            _args: &QueryArgs,
        ) -> StorageResult<Page<ContentRevision>> {
            Ok(Page::empty())
        }
    }

    fn service() -> RevisioningService<Content> {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        RevisioningService::new(
            Arc::new(LocalProvider::<Content, _>::new(store.clone())),
            Arc::new(LocalProvider::<ContentRevision, _>::new(store)),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::builder().tenant_id("acme").build().unwrap()
    }

    #[tokio::test]
    async fn test_each_change_records_a_revision() {
        let service = service();
        let ctx = ctx();
        let mut article = Content::new("hello");
        article.set_body(Some("v1".to_string()));
        assert_eq!(
            service.save(&ctx, &mut article, "first").await.method(),
            ChangeMethod::Add
        );
        article.set_body(Some("v2".to_string()));
        assert_eq!(
            service.save(&ctx, &mut article, "second").await.method(),
            ChangeMethod::Update
        );
        assert_eq!(
            service.save(&ctx, &mut article, "noop").await.method(),
            ChangeMethod::Unchanged
        );

        let history = service
            .revisions(&ctx, article.entity().id(), &QueryArgs::new())
            .await
            .unwrap();
        let messages: Vec<_> = history.items.iter().map(|r| r.message()).collect();
        assert_eq!(messages, ["first", "second"]);
        assert!(history.items.iter().all(|r| r.source_id() == article.entity().id()));
    }

    #[tokio::test]
    async fn test_history_is_scoped_to_source() {
        let service = service();
        let ctx = ctx();
        let mut a = Content::new("a");
        let mut b = Content::new("b");
        service.save(&ctx, &mut a, "a1").await;
        service.save(&ctx, &mut b, "b1").await;

        let history = service
            .revisions(&ctx, b.entity().id(), &QueryArgs::new().with_order(QueryOrder::Name))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.items[0].message(), "b1");
    }

    #[tokio::test]
    async fn test_revert_restores_content() {
        let service = service();
        let ctx = ctx();
        let mut article = Content::new("hello");
        article.set_body(Some("original".to_string()));
        service.save(&ctx, &mut article, "v1").await;
        let id = article.entity().id().to_string();

        article.set_body(Some("vandalized".to_string()));
        service.save(&ctx, &mut article, "v2").await;

        let history = service.revisions(&ctx, &id, &QueryArgs::new()).await.unwrap();
        let first = history.items[0].entity().id().to_string();

        let result = service.revert_to(&ctx, &id, &first, "revert").await;
        assert_eq!(result.method(), ChangeMethod::Update);

        let restored = service.entities().get(&ctx, &id, false).await.unwrap().unwrap();
        assert_eq!(restored.body(), Some("original"));
        let history = service.revisions(&ctx, &id, &QueryArgs::new()).await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_revert_rejects_foreign_revision() {
        let service = service();
        let ctx = ctx();
        let mut a = Content::new("a");
        let mut b = Content::new("b");
        service.save(&ctx, &mut a, "a1").await;
        service.save(&ctx, &mut b, "b1").await;

        let b_history = service
            .revisions(&ctx, b.entity().id(), &QueryArgs::new())
            .await
            .unwrap();
        let foreign = b_history.items[0].entity().id().to_string();
        let result = service.revert_to(&ctx, a.entity().id(), &foreign, "x").await;
        assert_eq!(result.error_kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_forbidden_history_saves_nothing() {
        let service = service();
        let content_only = RequestContext::builder()
            .tenant_id("acme")
            .permissions(TenantPermissions::builder().allow_kinds(vec![Content::KIND]).build())
            .build()
            .unwrap();
        let mut article = Content::new("hello");
        let result = service.save(&content_only, &mut article, "first").await;
        assert_eq!(result.error_kind(), ErrorKind::Forbidden);
        assert!(article.entity().revision().is_none());
        assert!(article.entity().has_changes());

        let stored = service
            .entities()
            .get(&ctx(), article.entity().id(), true)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_lost_revision_keeps_the_entity_result() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let service = RevisioningService::<Content>::new(
            Arc::new(LocalProvider::<Content, _>::new(store)),
            Arc::new(BusyHistory),
        );
        let ctx = ctx();
        let mut article = Content::new("hello");

        let result = service.save(&ctx, &mut article, "first").await;
        assert_eq!(result.method(), ChangeMethod::Add);
        assert!(result.is_successful());
        let message = result.message().unwrap();
        assert!(message.contains("content-revision"), "{message}");
        assert!(message.contains("busy"), "{message}");
        assert!(!article.entity().has_changes());
    }

    #[tokio::test]
    async fn test_stored_revisions_are_immutable() {
        let service = service();
        let ctx = ctx();
        let mut article = Content::new("hello");
        service.save(&ctx, &mut article, "v1").await;

        let history = service
            .revisions(&ctx, article.entity().id(), &QueryArgs::new())
            .await
            .unwrap();
        let id = history.items[0].entity().id().to_string();
        let mut revision = service.history().get(&ctx, &id, false).await.unwrap().unwrap();
        revision.entity_mut().set_name("rewritten");

        let result = service.history().save(&ctx, &mut revision).await;
        assert_eq!(result.method(), ChangeMethod::Invalid);
        assert_eq!(result.error_kind(), ErrorKind::Conflict);
    }
}
