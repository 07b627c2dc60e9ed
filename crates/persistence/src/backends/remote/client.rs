//! HTTP plumbing shared by remote providers.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::RemoteConfig;
use crate::error::{
    AccessError, ConcurrencyError, OperationError, ResourceError, StorageError, StorageResult,
    TransportError, ValidationError,
};
use crate::result::ChangingResultInfo;
use crate::tenant::RequestContext;

fn invalid_config(message: String) -> StorageError {
    ValidationError::InvalidArgument { message }.into()
}

/// A configured HTTP client bound to one service root.
///
/// Providers for several kinds usually share one client behind an `Arc`.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base: Url,
    config: RemoteConfig,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidArgument` - If the base URL or a default
    ///   header is malformed
    /// * `TransportError::Request` - If the HTTP client cannot be built
    pub fn new(config: RemoteConfig) -> StorageResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| invalid_config(format!("invalid base URL '{}': {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(invalid_config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid_config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid_config(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Request {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, base, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolves path segments below the base URL. Each segment is
    /// percent-encoded, so a `/` inside a segment stays part of it.
    pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Starts a request that carries the caller's identity headers.
    pub(crate) fn request(&self, ctx: &RequestContext, method: Method, url: Url) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .header(self.config.tenant_header.as_str(), ctx.tenant_id().as_str());
        if let Some(correlation_id) = ctx.correlation_id() {
            request = request.header(self.config.correlation_header.as_str(), correlation_id);
        }
        if let Some(user_id) = ctx.user_id() {
            request = request.header(self.config.user_header.as_str(), user_id);
        }
        request
    }

    /// Sends a request, abandoning it when the context is cancelled.
    pub(crate) async fn send(
        &self,
        ctx: &RequestContext,
        operation: &str,
        request: RequestBuilder,
    ) -> StorageResult<Response> {
        let response = ctx
            .run(operation, async {
                request.send().await.map_err(StorageError::from)
            })
            .await?;
        debug!(
            operation,
            url = %response.url(),
            status = response.status().as_u16(),
            tenant = %ctx.tenant_id(),
            "remote call"
        );
        Ok(response)
    }
}

/// Decodes a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> StorageResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        TransportError::Decode {
            message: e.to_string(),
        }
        .into()
    })
}

/// Reads a mutation envelope, whatever the status.
///
/// A body without a `state` key is not an envelope; the status code is
/// classified instead.
pub(crate) async fn read_change(response: Response) -> StorageResult<ChangingResultInfo> {
    let status = response.status();
    let body = response.text().await?;
    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        if value.get("state").is_some() {
            return serde_json::from_value(value).map_err(|e| {
                TransportError::Decode {
                    message: format!("malformed change envelope: {e}"),
                }
                .into()
            });
        }
    }
    Err(status_error(status, body))
}

/// Turns a non-success response into an error.
pub(crate) async fn error_from_response(response: Response) -> StorageError {
    let status = response.status();
    match response.text().await {
        Ok(body) => status_error(status, body),
        Err(err) => err.into(),
    }
}

/// Classifies a status code that came without a change envelope.
pub(crate) fn status_error(status: StatusCode, body: String) -> StorageError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no reason given")
            .to_string()
    } else {
        body
    };
    match status.as_u16() {
        400 => ValidationError::InvalidArgument { message }.into(),
        401 => AccessError::Unauthorized { message }.into(),
        403 => AccessError::Forbidden { message }.into(),
        404 => ResourceError::NotFound { message }.into(),
        409 | 412 => ConcurrencyError::Conflict { message }.into(),
        408 | 504 => TransportError::Timeout { message }.into(),
        429 | 503 => OperationError::Busy { message }.into(),
        501 => OperationError::Unsupported { message }.into(),
        status => TransportError::Status { status, message }.into(),
    }
}
