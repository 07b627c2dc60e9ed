//! Providers that forward every call to a remote service.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{IF_MATCH, IF_NONE_MATCH};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::client::{RemoteClient, error_from_response, read_change, read_json};
use crate::entity::{Projection, Resource, normalize_id};
use crate::error::{OperationError, StorageError, StorageResult};
use crate::provider::{BackendKind, Precondition, Provider};
use crate::query::QueryArgs;
use crate::result::{ChangeMethod, ChangingResultInfo};
use crate::revision::{Revision, RevisionHistory};
use crate::tenant::{Operation, RequestContext};
use crate::types::{CollectionEnvelope, Page};

/// A provider for one kind served under `{base}/{path}`.
///
/// | call | request |
/// |---|---|
/// | get | `GET {path}/e/{id}` (`?all=true` for every state) |
/// | search | `GET {path}?{query}` |
/// | save, put | `PUT {path}/e/{id}` with `If-Match` when a revision is known, `If-None-Match: *` to create only |
/// | delete | `DELETE {path}/e/{id}` |
/// | revisions | `GET {source_path}/{source_id}/revisions?{query}` |
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use tessera_persistence::backends::remote::{RemoteClient, RemoteConfig, RemoteProvider};
/// use tessera_persistence::entities::User;
/// use tessera_persistence::provider::Provider;
/// use tessera_persistence::query::QueryArgs;
/// use tessera_persistence::tenant::RequestContext;
///
/// let client = Arc::new(RemoteClient::new(RemoteConfig::new("https://cms.example.com/api"))?);
/// let users = RemoteProvider::<User>::new(client, "users");
/// let ctx = RequestContext::builder().tenant_id("acme").build()?;
///
/// let page = users.search(&ctx, &QueryArgs::parse("q=ada")).await?;
/// # Ok(())
/// # }
/// ```
pub struct RemoteProvider<E: Resource> {
    client: Arc<RemoteClient>,
    path: Vec<String>,
    source_path: Option<Vec<String>>,
    _kind: PhantomData<fn() -> E>,
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

impl<E: Resource> RemoteProvider<E> {
    pub fn new(client: Arc<RemoteClient>, path: &str) -> Self {
        Self {
            client,
            path: split_path(path),
            source_path: None,
            _kind: PhantomData,
        }
    }

    /// Sets the path of the kind whose revisions this provider lists.
    pub fn with_source_path(mut self, path: &str) -> Self {
        self.source_path = Some(split_path(path));
        self
    }

    pub fn client(&self) -> &Arc<RemoteClient> {
        &self.client
    }

    fn collection_url(&self) -> Url {
        self.client.endpoint(self.path.iter().map(String::as_str))
    }

    fn entity_url(&self, id: &str) -> Url {
        self.client
            .endpoint(self.path.iter().map(String::as_str).chain(["e", id]))
    }

    async fn fetch_page(
        &self,
        ctx: &RequestContext,
        operation: &str,
        url: Url,
        args: &QueryArgs,
    ) -> StorageResult<Page<E>> {
        let request = self
            .client
            .request(ctx, Method::GET, url)
            .query(&args.to_pairs());
        let response = self.client.send(ctx, operation, request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let envelope: CollectionEnvelope = read_json(response).await?;
        envelope.into_page()
    }

    async fn send_put(
        &self,
        ctx: &RequestContext,
        operation: &str,
        id: &str,
        body: &Value,
        precondition: Precondition<'_>,
    ) -> StorageResult<ChangingResultInfo> {
        let mut request = self
            .client
            .request(ctx, Method::PUT, self.entity_url(id))
            .json(body);
        match precondition {
            Precondition::Any => {}
            Precondition::Revision(revision) => {
                request = request.header(IF_MATCH, format!("\"{revision}\""));
            }
            Precondition::Absent => request = request.header(IF_NONE_MATCH, "*"),
        }
        let response = self.client.send(ctx, operation, request).await?;
        read_change(response).await
    }

    async fn try_save(
        &self,
        ctx: &RequestContext,
        entity: &mut E,
    ) -> StorageResult<ChangingResultInfo> {
        let stored = entity.entity().revision().is_some();
        let operation = if stored {
            Operation::Update
        } else {
            Operation::Create
        };
        ctx.authorize(operation, E::KIND)?;

        if stored && !entity.entity().has_changes() {
            return Ok(ChangingResultInfo::unchanged());
        }
        entity.validate()?;

        let id = entity.entity().id().to_string();
        let expected = entity.entity().revision().map(str::to_string);
        entity.entity_mut().prepare_for_saving();

        let outcome = async {
            let body = entity.project(Projection::Full)?;
            let info = self
                .send_put(
                    ctx,
                    "save",
                    &id,
                    &body,
                    Precondition::for_revision(expected.as_deref()),
                )
                .await?;
            let persisted = match info.data() {
                Some(data) if info.is_successful() => Some(E::from_json(data.clone())?),
                _ => None,
            };
            Ok::<_, StorageError>((info, persisted))
        }
        .await;

        match outcome {
            Ok((info, persisted)) if info.is_successful() => {
                let core = entity.entity_mut();
                if info.method() == ChangeMethod::Unchanged {
                    core.rollback_saving();
                } else if let Some(persisted) = persisted {
                    core.adopt_persisted(persisted.entity());
                }
                core.commit_saving();
                debug!(kind = E::KIND, id = %id, method = %info.method(), "saved remotely");
                Ok(info)
            }
            Ok((info, _)) => {
                entity.entity_mut().rollback_saving();
                warn!(
                    kind = E::KIND,
                    id = %id,
                    code = %info.error_kind(),
                    "remote save rejected, revision rolled back"
                );
                Ok(info)
            }
            Err(err) => {
                entity.entity_mut().rollback_saving();
                warn!(
                    kind = E::KIND,
                    id = %id,
                    tenant = %ctx.tenant_id(),
                    error = %err,
                    "remote save failed, revision rolled back"
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<E: Resource> Provider<E> for RemoteProvider<E> {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        id: &str,
        include_all_states: bool,
    ) -> StorageResult<Option<E>> {
        ctx.authorize(Operation::Read, E::KIND)?;
        let mut request = self
            .client
            .request(ctx, Method::GET, self.entity_url(&normalize_id(id)));
        if include_all_states {
            request = request.query(&[("all", "true")]);
        }
        let response = self.client.send(ctx, "get", request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value: Value = read_json(response).await?;
                Ok(Some(E::from_json(value)?))
            }
            _ => Err(error_from_response(response).await),
        }
    }

    async fn search(&self, ctx: &RequestContext, args: &QueryArgs) -> StorageResult<Page<E>> {
        ctx.authorize(Operation::Search, E::KIND)?;
        self.fetch_page(ctx, "search", self.collection_url(), args)
            .await
    }

    async fn save(&self, ctx: &RequestContext, entity: &mut E) -> ChangingResultInfo {
        match self.try_save(ctx, entity).await {
            Ok(result) => result,
            Err(err) => ChangingResultInfo::from_error(&err),
        }
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> ChangingResultInfo {
        if let Err(err) = ctx.authorize(Operation::Delete, E::KIND) {
            return ChangingResultInfo::from_error(&err.into());
        }
        let request = self
            .client
            .request(ctx, Method::DELETE, self.entity_url(&normalize_id(id)));
        let outcome = async {
            let response = self.client.send(ctx, "delete", request).await?;
            read_change(response).await
        }
        .await;
        outcome.unwrap_or_else(|err| ChangingResultInfo::from_error(&err))
    }

    async fn put(
        &self,
        ctx: &RequestContext,
        id: &str,
        body: &Value,
        precondition: Precondition<'_>,
    ) -> ChangingResultInfo {
        let operation = match precondition {
            Precondition::Absent => Operation::Create,
            _ => Operation::Update,
        };
        if let Err(err) = ctx.authorize(operation, E::KIND) {
            return ChangingResultInfo::from_error(&err.into());
        }
        self.send_put(ctx, "put", &normalize_id(id), body, precondition)
            .await
            .unwrap_or_else(|err| ChangingResultInfo::from_error(&err))
    }
}

#[async_trait]
impl<R: Revision> RevisionHistory<R> for RemoteProvider<R> {
    async fn list_revisions(
        &self,
        ctx: &RequestContext,
        source_id: &str,
        args: &QueryArgs,
    ) -> StorageResult<Page<R>> {
        ctx.authorize(Operation::Search, R::KIND)?;
        let Some(source_path) = &self.source_path else {
            return Err(OperationError::Unsupported {
                message: format!("no source path configured for {}", R::KIND),
            }
            .into());
        };
        let source_id = normalize_id(source_id);
        let url = self.client.endpoint(
            source_path
                .iter()
                .map(String::as_str)
                .chain([source_id.as_str(), "revisions"]),
        );
        self.fetch_page(ctx, "revisions", url, args).await
    }
}

impl<E: Resource> Clone for RemoteProvider<E> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            path: self.path.clone(),
            source_path: self.source_path.clone(),
            _kind: PhantomData,
        }
    }
}

impl<E: Resource> fmt::Debug for RemoteProvider<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("kind", &E::KIND)
            .field("path", &self.path.join("/"))
            .field("source_path", &self.source_path.as_ref().map(|p| p.join("/")))
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::remote::RemoteConfig;
    use crate::entities::{ContentRevision, User};
    use crate::result::ErrorKind;
    use crate::tenant::TenantPermissions;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, RemoteProvider<User>) {
        let server = MockServer::start().await;
        let client = RemoteClient::new(RemoteConfig::new(format!("{}/api", server.uri()))).unwrap();
        let provider = RemoteProvider::new(Arc::new(client), "users");
        (server, provider)
    }

    fn ctx() -> RequestContext {
        RequestContext::builder()
            .tenant_id("acme")
            .correlation_id("req-1")
            .build()
            .unwrap()
    }

    fn stored_user(id: &str, rev: &str) -> Value {
        json!({
            "id": id,
            "name": "ada",
            "state": 3,
            "created": "2024-01-01T00:00:00Z",
            "modified": "2024-01-02T00:00:00Z",
            "rev": rev,
            "config": {},
            "email": "ada@example.com",
        })
    }

    #[tokio::test]
    async fn test_get_sends_tenant_and_decodes() {
        let (server, users) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/users/e/u1"))
            .and(header("x-tenant-id", "acme"))
            .and(header("x-correlation-id", "req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_user("u1", "r1")))
            .expect(1)
            .mount(&server)
            .await;

        let user = users.get(&ctx(), "U1", false).await.unwrap().unwrap();
        assert_eq!(user.entity().id(), "u1");
        assert_eq!(user.entity().revision(), Some("r1"));
        assert_eq!(user.email(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_get_missing_is_none_and_all_states_flag() {
        let (server, users) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/users/e/gone"))
            .and(query_param("all", "true"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(users.get(&ctx(), "gone", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_classifies_status() {
        let (server, users) = setup().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("tenant suspended"))
            .mount(&server)
            .await;

        let err = users.get(&ctx(), "u1", false).await.unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::Forbidden);
        assert_eq!(err.to_string(), "tenant suspended");
    }

    #[tokio::test]
    async fn test_search_forwards_query() {
        let (server, users) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/users"))
            .and(query_param("q", "ada"))
            .and(query_param("count", "5"))
            .and(query_param("email", "ada@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offset": 0,
                "value": [stored_user("u1", "r1")],
                "total": 1,
            })))
            .mount(&server)
            .await;

        let args = QueryArgs::parse("q=ada&count=5&email=ada@example.com");
        let page = users.search(&ctx(), &args).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.total, Some(1));
        assert_eq!(page.items[0].entity().id(), "u1");
    }

    #[tokio::test]
    async fn test_save_adopts_server_revision() {
        let (server, users) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/api/users/e/u1"))
            .and(header("if-none-match", "*"))
            .and(body_partial_json(json!({"name": "ada"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": "add",
                "code": "none",
                "data": stored_user("u1", "server-rev"),
            })))
            .mount(&server)
            .await;

        let mut user = User::new("ada");
        user.entity_mut().set_id("u1");
        let result = users.save(&ctx(), &mut user).await;
        assert_eq!(result.method(), ChangeMethod::Add);
        assert_eq!(user.entity().revision(), Some("server-rev"));
        assert!(!user.entity().has_changes());

        // Nothing changed since, so no request is made.
        let result = users.save(&ctx(), &mut user).await;
        assert_eq!(result.method(), ChangeMethod::Unchanged);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_sends_if_match_and_rolls_back_on_conflict() {
        let (server, users) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/api/users/e/u1"))
            .and(header("if-match", "\"r1\""))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "state": "invalid",
                "code": "conflict",
                "message": "revision moved",
            })))
            .mount(&server)
            .await;

        let mut user = User::from_json(stored_user("u1", "r1")).unwrap();
        user.set_nickname(Some("countess".to_string()));
        let result = users.save(&ctx(), &mut user).await;
        assert_eq!(result.method(), ChangeMethod::Invalid);
        assert_eq!(result.error_kind(), ErrorKind::Conflict);
        assert_eq!(result.message(), Some("revision moved"));
        assert_eq!(user.entity().revision(), Some("r1"));
        assert!(user.entity().has_changes());
    }

    #[tokio::test]
    async fn test_fresh_save_over_existing_id_is_conflict() {
        let (server, users) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/api/users/e/u1"))
            .and(header("if-none-match", "*"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "state": "invalid",
                "code": "conflict",
                "message": "entity already exists: user/u1",
            })))
            .expect(2)
            .mount(&server)
            .await;

        let mut user = User::new("impostor");
        user.entity_mut().set_id("u1");
        let result = users.save(&ctx(), &mut user).await;
        assert_eq!(result.error_kind(), ErrorKind::Conflict);
        assert!(user.entity().revision().is_none());

        let result = users
            .put(&ctx(), "u1", &json!({"name": "impostor"}), Precondition::Absent)
            .await;
        assert_eq!(result.error_kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_save_without_envelope_uses_status() {
        let (server, users) = setup().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut user = User::new("ada");
        let result = users.save(&ctx(), &mut user).await;
        assert_eq!(result.error_kind(), ErrorKind::Busy);
        assert!(user.entity().revision().is_none());
    }

    #[tokio::test]
    async fn test_local_checks_happen_before_transport() {
        let (server, users) = setup().await;

        let mut invalid = User::new("");
        let result = users.save(&ctx(), &mut invalid).await;
        assert_eq!(result.error_kind(), ErrorKind::Validation);

        let read_only = RequestContext::builder()
            .tenant_id("acme")
            .permissions(TenantPermissions::read_only())
            .build()
            .unwrap();
        let result = users.delete(&read_only, "u1").await;
        assert_eq!(result.error_kind(), ErrorKind::Forbidden);

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reads_envelope() {
        let (server, users) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/api/users/e/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": "remove",
                "code": "none",
            })))
            .mount(&server)
            .await;

        let result = users.delete(&ctx(), "u1").await;
        assert_eq!(result.method(), ChangeMethod::Remove);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_canceled() {
        let (server, users) = setup().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(stored_user("u1", "r1"))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let ctx = ctx();
        let cancel = ctx.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let err = users.get(&ctx, "u1", false).await.unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::Canceled);
    }

    #[tokio::test]
    async fn test_revisions_use_source_path() {
        let server = MockServer::start().await;
        let client = Arc::new(RemoteClient::new(RemoteConfig::new(server.uri())).unwrap());
        let revisions =
            RemoteProvider::<ContentRevision>::new(client.clone(), "revisions").with_source_path("content");
        Mock::given(method("GET"))
            .and(path("/content/c1/revisions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offset": 0,
                "col": [{
                    "id": "r1",
                    "name": "article",
                    "source": "c1",
                    "message": "first",
                }],
            })))
            .mount(&server)
            .await;

        let page = revisions
            .list_revisions(&ctx(), "C1", &QueryArgs::new())
            .await
            .unwrap();
        assert_eq!(page.items[0].message(), "first");

        let unconfigured = RemoteProvider::<ContentRevision>::new(client, "revisions");
        let err = unconfigured
            .list_revisions(&ctx(), "c1", &QueryArgs::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::Unsupported);
    }
}
