//! Request context for provider operations.
//!
//! Every provider call takes a [`RequestContext`]: it scopes the call to one
//! tenant, carries the caller's permissions and identity for auditing, and
//! carries the cancellation token that aborts in-flight storage or transport
//! work.

use std::future::Future;
use std::sync::Arc;

use super::cancel::CancelToken;
use super::id::TenantId;
use super::permissions::{Operation, TenantPermissions};
use crate::error::{AccessError, OperationError, StorageResult, ValidationError};

/// The per-request context required by all provider operations.
///
/// # Examples
///
/// ```
/// use tessera_persistence::tenant::{Operation, RequestContext, TenantId, TenantPermissions};
///
/// let ctx = RequestContext::new(TenantId::new("acme"), TenantPermissions::read_only())
///     .with_user_id("u-1")
///     .with_correlation_id("req-42");
///
/// assert!(ctx.authorize(Operation::Search, "content").is_ok());
/// assert!(ctx.authorize(Operation::Delete, "content").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    tenant_id: TenantId,
    permissions: Arc<TenantPermissions>,
    /// Optional correlation ID for request tracing.
    correlation_id: Option<String>,
    /// Optional authenticated user.
    user_id: Option<String>,
    cancel: CancelToken,
}

impl RequestContext {
    /// Creates a context with the given tenant and permissions.
    pub fn new(tenant_id: TenantId, permissions: TenantPermissions) -> Self {
        Self {
            tenant_id,
            permissions: Arc::new(permissions),
            correlation_id: None,
            user_id: None,
            cancel: CancelToken::new(),
        }
    }

    /// Starts a builder for contexts assembled from external input.
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::new()
    }

    /// Creates a full-access context for the given tenant.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self::new(tenant_id, TenantPermissions::full_access())
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Shares an existing cancellation token with this context.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn permissions(&self) -> &TenantPermissions {
        &self.permissions
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Checks whether this caller may perform `operation` on `kind`.
    pub fn authorize(&self, operation: Operation, kind: &str) -> Result<(), AccessError> {
        self.permissions
            .check(operation, kind, self.user_id.as_deref())
    }

    /// Runs `work` unless the request is cancelled first.
    ///
    /// Cancellation drops `work` at its next await point and yields a
    /// `Canceled` error naming `operation`.
    pub async fn run<T, F>(&self, operation: &str, work: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(OperationError::canceled(operation).into());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OperationError::canceled(operation).into()),
            result = work => result,
        }
    }
}

/// Builder for request contexts assembled from external input
/// (e.g., HTTP headers or CLI flags).
#[derive(Default)]
pub struct RequestContextBuilder {
    tenant_id: Option<String>,
    permissions: Option<TenantPermissions>,
    correlation_id: Option<String>,
    user_id: Option<String>,
}

impl RequestContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant ID; it is validated in [`build`](Self::build).
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn permissions(mut self, permissions: TenantPermissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Builds the context. A missing tenant falls back to the default tenant;
    /// a malformed one is an argument error.
    pub fn build(self) -> Result<RequestContext, ValidationError> {
        let tenant_id = match self.tenant_id {
            Some(raw) => TenantId::parse(&raw)?,
            None => TenantId::default(),
        };

        let permissions = self
            .permissions
            .unwrap_or_else(TenantPermissions::full_access);

        let mut ctx = RequestContext::new(tenant_id, permissions);
        ctx.correlation_id = self.correlation_id;
        ctx.user_id = self.user_id;

        Ok(ctx)
    }
}
