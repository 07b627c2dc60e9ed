//! Tenancy and request scoping.
//!
//! All provider operations require a [`RequestContext`], which ties the call to
//! one tenant, carries the caller's permissions and identity, and carries the
//! cancellation token for the request.
//!
//! # Core Types
//!
//! - [`TenantId`] - Validated tenant identifier
//! - [`RequestContext`] - Context required for every provider operation
//! - [`TenantPermissions`] - What operations a context may perform, on which kinds
//! - [`CancelToken`] - Cooperative cancellation shared across clones
//!
//! # Examples
//!
//! ```
//! use tessera_persistence::tenant::{RequestContext, TenantId, TenantPermissions};
//!
//! let ctx = RequestContext::new(
//!     TenantId::new("acme"),
//!     TenantPermissions::full_access(),
//! );
//!
//! let cancel = ctx.cancel_token().clone();
//! cancel.cancel();
//! assert!(ctx.is_cancelled());
//! ```

mod cancel;
mod context;
mod id;
mod permissions;

pub use cancel::CancelToken;
pub use context::{RequestContext, RequestContextBuilder};
pub use id::{DEFAULT_TENANT, TenantId};
pub use permissions::{Operation, TenantPermissions, TenantPermissionsBuilder};
