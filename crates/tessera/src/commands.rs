//! Command execution against a provider registry.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use serde_json::Value;
use tracing::{debug, info};

use tessera_persistence::entities::{Comment, Content, ContentRevision, Membership, User, UserGroup};
use tessera_persistence::entity::{Projection, Resource, new_entity_id};
use tessera_persistence::provider::{Precondition, ProviderRegistry};
use tessera_persistence::query::QueryArgs;
use tessera_persistence::revision::RevisionHistory;
use tessera_persistence::tenant::RequestContext;

use crate::config::{BackendMode, CliConfig, Command, Kind};

/// Runs a generic function on the entity type named by a [`Kind`].
macro_rules! by_kind {
    ($kind:expr, $handler:ident($($arg:expr),* $(,)?)) => {
        match $kind {
            Kind::User => $handler::<User>($($arg),*).await,
            Kind::Group => $handler::<UserGroup>($($arg),*).await,
            Kind::Membership => $handler::<Membership>($($arg),*).await,
            Kind::Content => $handler::<Content>($($arg),*).await,
            Kind::ContentRevision => $handler::<ContentRevision>($($arg),*).await,
            Kind::Comment => $handler::<Comment>($($arg),*).await,
        }
    };
}

/// What a command prints, and whether it counts as success.
#[derive(Debug)]
pub struct Outcome {
    pub output: Value,
    pub success: bool,
}

impl Outcome {
    fn ok(output: Value) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

/// Providers for every kind plus the content history, bound to one tenant.
pub struct Session {
    registry: ProviderRegistry,
    revisions: Arc<dyn RevisionHistory<ContentRevision>>,
    ctx: RequestContext,
}

impl Session {
    /// Opens the configured backend and builds the request context.
    pub fn connect(config: &CliConfig) -> anyhow::Result<Self> {
        let mut builder = RequestContext::builder();
        if let Some(tenant) = &config.tenant {
            builder = builder.tenant_id(tenant.clone());
        }
        if let Some(user) = &config.user {
            builder = builder.user_id(user.clone());
        }
        let ctx = builder.build().context("invalid request context")?;

        let (registry, revisions) = match config.backend_mode() {
            BackendMode::Sqlite { path } => sqlite_providers(&path)?,
            BackendMode::Remote { base_url, timeout } => remote_providers(&base_url, timeout)?,
        };
        info!(
            tenant = %ctx.tenant_id(),
            kinds = registry.len(),
            "providers ready"
        );

        Ok(Self {
            registry,
            revisions,
            ctx,
        })
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<Outcome> {
        debug!(?command, "running command");
        match command {
            Command::Get { kind, id, all } => by_kind!(kind, get(self, &id, all)),
            Command::Search { kind, query } => {
                let args = QueryArgs::parse(query.as_deref().unwrap_or_default());
                by_kind!(kind, search(self, &args))
            }
            Command::Put {
                kind,
                json,
                id,
                revision,
                create,
            } => {
                let body: Value = serde_json::from_str(&json).context("body is not JSON")?;
                let id = id
                    .or_else(|| body.get("id").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(new_entity_id);
                let precondition = if create {
                    Precondition::Absent
                } else {
                    Precondition::matching(revision.as_deref())
                };
                by_kind!(kind, put(self, &id, &body, precondition))
            }
            Command::Delete { kind, id } => by_kind!(kind, delete(self, &id)),
            Command::Revisions { source_id, query } => {
                let args = QueryArgs::parse(query.as_deref().unwrap_or_default());
                let page = self
                    .revisions
                    .list_revisions(&self.ctx, &source_id, &args)
                    .await?;
                Ok(Outcome::ok(serde_json::to_value(
                    page.to_envelope(Projection::Slim)?,
                )?))
            }
        }
    }
}

async fn get<E: Resource>(session: &Session, id: &str, all: bool) -> anyhow::Result<Outcome> {
    let provider = session.registry.get::<E>()?;
    match provider.get(&session.ctx, id, all).await? {
        Some(entity) => Ok(Outcome::ok(entity.project(Projection::Full)?)),
        None => Err(anyhow!("{} '{}' not found", E::KIND, id)),
    }
}

async fn search<E: Resource>(session: &Session, args: &QueryArgs) -> anyhow::Result<Outcome> {
    let provider = session.registry.get::<E>()?;
    let page = provider.search(&session.ctx, args).await?;
    Ok(Outcome::ok(serde_json::to_value(
        page.to_envelope(Projection::Slim)?,
    )?))
}

async fn put<E: Resource>(
    session: &Session,
    id: &str,
    body: &Value,
    precondition: Precondition<'_>,
) -> anyhow::Result<Outcome> {
    let provider = session.registry.get::<E>()?;
    let result = provider.put(&session.ctx, id, body, precondition).await;
    Ok(Outcome {
        success: result.is_successful(),
        output: serde_json::to_value(&result)?,
    })
}

async fn delete<E: Resource>(session: &Session, id: &str) -> anyhow::Result<Outcome> {
    let provider = session.registry.get::<E>()?;
    let result = provider.delete(&session.ctx, id).await;
    Ok(Outcome {
        success: result.is_successful(),
        output: serde_json::to_value(&result)?,
    })
}

type Providers = (ProviderRegistry, Arc<dyn RevisionHistory<ContentRevision>>);

#[cfg(feature = "sqlite")]
fn sqlite_providers(path: &str) -> anyhow::Result<Providers> {
    use tessera_persistence::backends::sqlite::SqliteStore;
    use tessera_persistence::provider::LocalProvider;

    info!(database = %path, "opening sqlite store");
    let store = Arc::new(SqliteStore::open(path)?);
    let revisions = Arc::new(LocalProvider::<ContentRevision, _>::new(store.clone()));
    let registry = ProviderRegistry::builder()
        .register::<User>(Arc::new(LocalProvider::<User, _>::new(store.clone())))
        .register::<UserGroup>(Arc::new(LocalProvider::<UserGroup, _>::new(store.clone())))
        .register::<Membership>(Arc::new(LocalProvider::<Membership, _>::new(store.clone())))
        .register::<Content>(Arc::new(LocalProvider::<Content, _>::new(store.clone())))
        .register::<Comment>(Arc::new(LocalProvider::<Comment, _>::new(store)))
        .register::<ContentRevision>(revisions.clone())
        .build();
    let history: Arc<dyn RevisionHistory<ContentRevision>> = revisions;
    Ok((registry, history))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_providers(_path: &str) -> anyhow::Result<Providers> {
    anyhow::bail!(
        "The local store requires the 'sqlite' feature. \
         Build with: cargo build -p tessera --features sqlite"
    )
}

#[cfg(feature = "remote")]
fn remote_providers(base_url: &str, timeout: std::time::Duration) -> anyhow::Result<Providers> {
    use tessera_persistence::backends::remote::{RemoteClient, RemoteConfig, RemoteProvider};

    info!(base_url = %base_url, ?timeout, "connecting to remote provider");
    let client = Arc::new(RemoteClient::new(
        RemoteConfig::new(base_url).with_timeout(timeout),
    )?);
    fn remote<E: Resource>(client: &Arc<RemoteClient>) -> Arc<RemoteProvider<E>> {
        Arc::new(RemoteProvider::new(client.clone(), E::KIND))
    }

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
    let history: Arc<dyn RevisionHistory<ContentRevision>> = revisions;
    Ok((registry, history))
}

#[cfg(not(feature = "remote"))]
fn remote_providers(_base_url: &str, _timeout: std::time::Duration) -> anyhow::Result<Providers> {
    anyhow::bail!(
        "Remote providers require the 'remote' feature. \
         Build with: cargo build -p tessera --features remote"
    )
}
