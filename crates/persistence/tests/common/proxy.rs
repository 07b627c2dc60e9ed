//! An HTTP service that exposes local providers over the remote conventions.
//!
//! The remote transport is tested against this proxy so that every scenario
//! runs over SQLite directly and over HTTP with the same expectations.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{IF_MATCH, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tessera_persistence::backends::remote::{CORRELATION_HEADER, TENANT_HEADER, USER_HEADER};
use tessera_persistence::entities::{Comment, Content, ContentRevision, Membership, User, UserGroup};
use tessera_persistence::entity::{Projection, Resource};
use tessera_persistence::error::StorageError;
use tessera_persistence::provider::{Precondition, ProviderRegistry};
use tessera_persistence::query::QueryArgs;
use tessera_persistence::result::{ChangingResultInfo, ErrorKind};
use tessera_persistence::revision::RevisionHistory;
use tessera_persistence::tenant::RequestContext;

#[derive(Clone)]
struct ProxyState {
    registry: Arc<ProviderRegistry>,
    revisions: Arc<dyn RevisionHistory<ContentRevision>>,
}

/// A running proxy; the server stops when this is dropped.
pub struct TestProxy {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves `registry` on an ephemeral local port.
pub async fn spawn(
    registry: Arc<ProviderRegistry>,
    revisions: Arc<dyn RevisionHistory<ContentRevision>>,
) -> TestProxy {
    let state = ProxyState {
        registry,
        revisions,
    };
    let app = Router::new()
        .route("/{kind}", get(search))
        .route("/{kind}/e/{id}", get(fetch).put(put).delete(delete))
        .route("/{kind}/{id}/revisions", get(list_revisions))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestProxy {
        base_url: format!("http://{addr}"),
        handle,
    }
}

/// Dispatches a generic handler on the kind named in the path.
macro_rules! by_kind {
    ($kind:expr, $handler:ident($($arg:expr),* $(,)?)) => {
        match $kind {
            "user" => $handler::<User>($($arg),*).await,
            "group" => $handler::<UserGroup>($($arg),*).await,
            "membership" => $handler::<Membership>($($arg),*).await,
            "content" => $handler::<Content>($($arg),*).await,
            "content-revision" => $handler::<ContentRevision>($($arg),*).await,
            "comment" => $handler::<Comment>($($arg),*).await,
            other => (StatusCode::NOT_FOUND, format!("unknown kind '{other}'")).into_response(),
        }
    };
}

fn context(headers: &HeaderMap) -> Result<RequestContext, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let mut builder = RequestContext::builder();
    if let Some(tenant) = header(TENANT_HEADER) {
        builder = builder.tenant_id(tenant);
    }
    if let Some(correlation_id) = header(CORRELATION_HEADER) {
        builder = builder.correlation_id(correlation_id);
    }
    if let Some(user_id) = header(USER_HEADER) {
        builder = builder.user_id(user_id);
    }
    builder
        .build()
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()).into_response())
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::None => StatusCode::OK,
        ErrorKind::Argument | ErrorKind::Validation | ErrorKind::Key => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &StorageError) -> Response {
    (status_for(err.error_kind()), err.to_string()).into_response()
}

fn change_response(info: ChangingResultInfo) -> Response {
    (status_for(info.error_kind()), Json(info)).into_response()
}

async fn fetch(
    State(state): State<ProxyState>,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let ctx = match context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let all = params.iter().any(|(key, value)| key == "all" && value == "true");
    by_kind!(kind.as_str(), fetch_one(&state.registry, &ctx, &id, all))
}

async fn fetch_one<E: Resource>(
    registry: &ProviderRegistry,
    ctx: &RequestContext,
    id: &str,
    all: bool,
) -> Response {
    let provider = match registry.get::<E>() {
        Ok(provider) => provider,
        Err(err) => return error_response(&err),
    };
    match provider.get(ctx, id, all).await {
        Ok(Some(entity)) => match entity.project(Projection::Full) {
            Ok(value) => Json(value).into_response(),
            Err(err) => error_response(&err),
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => error_response(&err),
    }
}

async fn search(
    State(state): State<ProxyState>,
    Path(kind): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let ctx = match context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let args = QueryArgs::from_pairs(params);
    by_kind!(kind.as_str(), search_page(&state.registry, &ctx, &args))
}

async fn search_page<E: Resource>(
    registry: &ProviderRegistry,
    ctx: &RequestContext,
    args: &QueryArgs,
) -> Response {
    let provider = match registry.get::<E>() {
        Ok(provider) => provider,
        Err(err) => return error_response(&err),
    };
    let envelope = match provider.search(ctx, args).await {
        Ok(page) => page.to_envelope(Projection::Slim),
        Err(err) => Err(err),
    };
    match envelope {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn put(
    State(state): State<ProxyState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let ctx = match context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    };
    let expected = header(IF_MATCH).map(|value| value.trim_matches('"').to_string());
    let precondition = if header(IF_NONE_MATCH) == Some("*") {
        Precondition::Absent
    } else {
        Precondition::matching(expected.as_deref())
    };
    by_kind!(
        kind.as_str(),
        put_one(&state.registry, &ctx, &id, &body, precondition)
    )
}

async fn put_one<E: Resource>(
    registry: &ProviderRegistry,
    ctx: &RequestContext,
    id: &str,
    body: &Value,
    precondition: Precondition<'_>,
) -> Response {
    match registry.get::<E>() {
        Ok(provider) => change_response(provider.put(ctx, id, body, precondition).await),
        Err(err) => change_response(ChangingResultInfo::from_error(&err)),
    }
}

async fn delete(
    State(state): State<ProxyState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ctx = match context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    by_kind!(kind.as_str(), delete_one(&state.registry, &ctx, &id))
}

async fn delete_one<E: Resource>(
    registry: &ProviderRegistry,
    ctx: &RequestContext,
    id: &str,
) -> Response {
    match registry.get::<E>() {
        Ok(provider) => change_response(provider.delete(ctx, id).await),
        Err(err) => change_response(ChangingResultInfo::from_error(&err)),
    }
}

async fn list_revisions(
    State(state): State<ProxyState>,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let ctx = match context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if kind != Content::KIND {
        return StatusCode::NOT_FOUND.into_response();
    }
    let args = QueryArgs::from_pairs(params);
    let envelope = match state.revisions.list_revisions(&ctx, &id, &args).await {
        Ok(page) => page.to_envelope(Projection::Slim),
        Err(err) => Err(err),
    };
    match envelope {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => error_response(&err),
    }
}
