//! Tessera persistence layer
//!
//! This crate provides the entity framework and provider layer of a
//! multi-tenant content and identity store. Every domain object shares one
//! identity and lifecycle core, optionally carries a free-form JSON config,
//! and is read and written through a provider that is either local (SQLite)
//! or remote (HTTP) behind the same contract.
//!
//! # Features
//!
//! - **Entity core**: lazily generated ids, revision tokens with rollback,
//!   change tracking, slim and full JSON projections
//! - **Configurable JSON**: typed getters over a lazily parsed config object,
//!   `config.<key>` partial updates
//! - **Ownership**: owner and owner+target relationships between entities
//! - **Queries**: lenient [`QueryArgs`] parsing and a shared engine for
//!   filtering, ordering and paging
//! - **Change results**: every mutation reports a [`ChangeMethod`] and, on
//!   failure, an [`ErrorKind`]
//! - **Revisions**: immutable snapshots with history lookup and revert
//! - **Multitenancy**: every call is scoped by a [`RequestContext`]
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! tessera-persistence = { version = "0.1", default-features = false, features = ["sqlite"] }
//! ```
//!
//! - `sqlite` (default) - SQLite with in-memory and file modes
//! - `remote` (default) - HTTP providers built on `reqwest`
//!
//! # Architecture
//!
//! - [`entity`] - The entity core, config payloads, relationships and patches
//! - [`entities`] - Users, groups, memberships, content, revisions, comments
//! - [`query`] - Query arguments and predication
//! - [`result`] - Change results and the error taxonomy
//! - [`revision`] - Revision traits and the revisioning service
//! - [`provider`] - The provider contract, local providers and the registry
//! - [`backends`] - SQLite store and remote providers
//! - [`tenant`] - Request context, tenant ids, permissions, cancellation
//! - [`types`] - Stored rows, pages and envelopes
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tessera_persistence::backends::sqlite::SqliteStore;
//! use tessera_persistence::entities::Content;
//! use tessera_persistence::provider::{LocalProvider, Provider};
//! use tessera_persistence::query::QueryArgs;
//! use tessera_persistence::result::ChangeMethod;
//! use tessera_persistence::tenant::RequestContext;
//!
//! let store = Arc::new(SqliteStore::open("tessera.db")?);
//! let content = LocalProvider::<Content, _>::new(store);
//! let ctx = RequestContext::builder().tenant_id("acme").build()?;
//!
//! let mut article = Content::new("hello world");
//! article.set_body(Some("<p>hi</p>".to_string()));
//! assert_eq!(content.save(&ctx, &mut article).await.method(), ChangeMethod::Add);
//!
//! let page = content.search(&ctx, &QueryArgs::parse("q=hello")).await?;
//! assert_eq!(page.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Change Results
//!
//! ```
//! use tessera_persistence::error::{AccessError, StorageError};
//! use tessera_persistence::result::{ChangingResultInfo, ErrorKind};
//!
//! let err: StorageError = AccessError::Forbidden { message: "read only".into() }.into();
//! let result = ChangingResultInfo::from_error(&err);
//! assert_eq!(result.error_kind(), ErrorKind::Forbidden);
//! assert!(!result.is_successful());
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod entities;
pub mod entity;
pub mod error;
pub mod provider;
pub mod query;
pub mod result;
pub mod revision;
pub mod tenant;
pub mod types;

// Re-export commonly used types at crate root
pub use entity::{ConfigurableEntity, Projection, Resource, ResourceEntity, ResourceState};
pub use error::{StorageError, StorageResult};
pub use provider::{BackendKind, EntityStore, LocalProvider, Precondition, Provider, ProviderRegistry};
pub use query::{QueryArgs, QueryPredication};
pub use result::{ChangeMethod, ChangingResultInfo, ErrorKind};
pub use revision::{Revision, RevisionHistory, RevisioningService, Versioned};
pub use tenant::{RequestContext, TenantId, TenantPermissions};
pub use types::{Page, StoredResource};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
