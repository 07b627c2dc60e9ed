//! Test harness: providers for every kind over one transport.

use std::sync::Arc;

use tessera_persistence::backends::remote::{RemoteClient, RemoteConfig, RemoteProvider};
use tessera_persistence::backends::sqlite::SqliteStore;
use tessera_persistence::entities::{Comment, Content, ContentRevision, Membership, User, UserGroup};
use tessera_persistence::entity::Resource;
use tessera_persistence::provider::{LocalProvider, Provider, ProviderRegistry};
use tessera_persistence::revision::{RevisionHistory, RevisioningService};
use tessera_persistence::tenant::{RequestContext, TenantId, TenantPermissions};

use super::proxy::{self, TestProxy};

/// How providers reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Local,
    Remote,
}

/// Context for running provider scenarios.
pub struct TestContext {
    pub transport: Transport,

    /// Providers for every kind, as seen by the code under test.
    pub registry: ProviderRegistry,

    /// Revision history of content items.
    pub revisions: Arc<dyn RevisionHistory<ContentRevision>>,

    /// The store behind both transports.
    pub store: Arc<SqliteStore>,

    /// Primary tenant context for tests.
    pub tenant: RequestContext,

    /// Secondary tenant context for isolation tests.
    pub secondary_tenant: RequestContext,

    proxy: Option<TestProxy>,
}

fn local_registry(
    store: &Arc<SqliteStore>,
) -> (ProviderRegistry, Arc<dyn RevisionHistory<ContentRevision>>) {
    let revisions = Arc::new(LocalProvider::<ContentRevision, _>::new(store.clone()));
    let registry = ProviderRegistry::builder()
        .register::<User>(Arc::new(LocalProvider::<User, _>::new(store.clone())))
        .register::<UserGroup>(Arc::new(LocalProvider::<UserGroup, _>::new(store.clone())))
        .register::<Membership>(Arc::new(LocalProvider::<Membership, _>::new(store.clone())))
        .register::<Content>(Arc::new(LocalProvider::<Content, _>::new(store.clone())))
        .register::<Comment>(Arc::new(LocalProvider::<Comment, _>::new(store.clone())))
        .register::<ContentRevision>(revisions.clone())
        .build();
    let history: Arc<dyn RevisionHistory<ContentRevision>> = revisions;
    (registry, history)
}

fn remote<E: Resource>(client: &Arc<RemoteClient>) -> Arc<RemoteProvider<E>> {
    Arc::new(RemoteProvider::new(client.clone(), E::KIND))
}

impl TestContext {
    /// Providers that talk to SQLite directly.
    pub async fn local() -> Self {
        let store = Arc::new(SqliteStore::in_memory().expect("Failed to create SQLite store"));
        let (registry, revisions) = local_registry(&store);
        Self::assemble(Transport::Local, registry, revisions, store, None)
    }

    /// Remote providers in front of a proxy that serves SQLite.
    pub async fn remote() -> Self {
        let store = Arc::new(SqliteStore::in_memory().expect("Failed to create SQLite store"));
        let (served, served_revisions) = local_registry(&store);
        let proxy = proxy::spawn(Arc::new(served), served_revisions).await;

        let client = Arc::new(
            RemoteClient::new(RemoteConfig::new(proxy.base_url.clone()))
                .expect("Failed to create remote client"),
        );
        let revisions = Arc::new(
            RemoteProvider::<ContentRevision>::new(client.clone(), ContentRevision::KIND)
                .with_source_path(Content::KIND),
        );
        let registry = ProviderRegistry::builder()
            .register::<User>(remote::<User>(&client))
            .register::<UserGroup>(remote::<UserGroup>(&client))
            .register::<Membership>(remote::<Membership>(&client))
            .register::<Content>(remote::<Content>(&client))
            .register::<Comment>(remote::<Comment>(&client))
            .register::<ContentRevision>(revisions.clone())
            .build();
        Self::assemble(Transport::Remote, registry, revisions, store, Some(proxy))
    }

    fn assemble(
        transport: Transport,
        registry: ProviderRegistry,
        revisions: Arc<dyn RevisionHistory<ContentRevision>>,
        store: Arc<SqliteStore>,
        proxy: Option<TestProxy>,
    ) -> Self {
        Self {
            transport,
            registry,
            revisions,
            store,
            tenant: RequestContext::new(TenantId::new("test-tenant-1"), TenantPermissions::full_access())
                .with_correlation_id("test-request"),
            secondary_tenant: RequestContext::new(
                TenantId::new("test-tenant-2"),
                TenantPermissions::full_access(),
            ),
            proxy,
        }
    }

    /// The provider for `E`.
    pub fn provider<E: Resource>(&self) -> Arc<dyn Provider<E>> {
        self.registry
            .get::<E>()
            .expect("every kind is registered")
    }

    pub fn revisioning(&self) -> RevisioningService<Content> {
        RevisioningService::new(self.provider::<Content>(), self.revisions.clone())
    }

    /// Creates a tenant context with read-only permissions.
    pub fn read_only_tenant(&self) -> RequestContext {
        RequestContext::new(self.tenant.tenant_id().clone(), TenantPermissions::read_only())
    }

    /// Creates a tenant context with custom permissions.
    pub fn tenant_with_permissions(&self, permissions: TenantPermissions) -> RequestContext {
        RequestContext::new(self.tenant.tenant_id().clone(), permissions)
    }
}

/// Runs a scenario `async fn(&TestContext)` over both transports.
///
/// Expands to a module named after the scenario with `local` and `remote`
/// tests.
#[macro_export]
macro_rules! transport_test {
    ($scenario:ident) => {
        mod $scenario {
            #[tokio::test]
            async fn local() {
                let ctx = $crate::common::TestContext::local().await;
                super::$scenario(&ctx).await;
            }

            #[tokio::test]
            async fn remote() {
                let ctx = $crate::common::TestContext::remote().await;
                super::$scenario(&ctx).await;
            }
        }
    };
}
