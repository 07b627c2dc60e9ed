//! Error types for the persistence layer.
//!
//! Every fallible operation returns a [`StorageError`]. The categories mirror
//! the taxonomy in [`crate::result::ErrorKind`]: each concrete variant maps to
//! exactly one kind through [`StorageError::error_kind`], and each kind can be
//! turned back into a representative variant when a change result has to be
//! raised again.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::result::ErrorKind;

/// The primary error type for all persistence operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Entity state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Optimistic concurrency errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Authentication and authorization errors
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Argument and validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Local store errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Remote transport errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Lifecycle errors of a running operation
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// A fault that already carries its taxonomy kind
    #[error(transparent)]
    Change(#[from] ChangeError),
}

/// Errors related to entity existence and identity.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested entity was not found.
    #[error("{message}")]
    NotFound { message: String },

    /// The key is invalid or collides with an existing entity.
    #[error("{message}")]
    Key { message: String },
}

impl ResourceError {
    /// Builds the not-found error for `kind/id`.
    pub fn not_found(kind: &str, id: &str) -> Self {
        ResourceError::NotFound {
            message: format!("entity not found: {kind}/{id}"),
        }
    }

    /// Builds the duplicate-key error for `kind/id`.
    pub fn duplicate_key(kind: &str, id: &str) -> Self {
        ResourceError::Key {
            message: format!("entity already exists: {kind}/{id}"),
        }
    }
}

/// Errors raised by optimistic concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The stored revision moved since the entity was read.
    #[error("revision conflict on {kind}/{id}: expected {expected:?}, found {actual:?}")]
    RevisionConflict {
        kind: String,
        id: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// A conflict reported without revision detail.
    #[error("{message}")]
    Conflict { message: String },
}

/// Errors related to who is calling.
#[derive(Error, Debug)]
pub enum AccessError {
    /// The caller is known but lacks permission.
    #[error("{message}")]
    Forbidden { message: String },

    /// The caller is not authenticated.
    #[error("{message}")]
    Unauthorized { message: String },
}

/// Errors related to arguments and entity content.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A caller-supplied argument is malformed.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// A request required a body and none was given.
    #[error("request body is required")]
    MissingBody,

    /// An operation required an id and none was given.
    #[error("{kind} id is required")]
    MissingId { kind: String },

    /// A patch document could not be applied.
    #[error("invalid patch: {message}")]
    InvalidPatch { message: String },

    /// A single field holds an unacceptable value.
    #[error("invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    /// The entity as a whole failed validation.
    #[error("{message}")]
    Invalid { message: String },
}

impl ValidationError {
    /// Whether the error describes a malformed argument rather than bad content.
    pub fn is_argument(&self) -> bool {
        matches!(
            self,
            ValidationError::InvalidArgument { .. }
                | ValidationError::MissingBody
                | ValidationError::MissingId { .. }
        )
    }
}

/// Errors originating from a local store.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The store is currently unavailable.
    #[error("backend unavailable: {backend_name}: {message}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// The requested capability is not supported by this store.
    #[error("capability '{capability}' not supported by {backend_name}")]
    UnsupportedCapability {
        backend_name: String,
        capability: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal store error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors raised while talking to a remote service.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be sent or the connection broke.
    #[error("request failed: {message}")]
    Request { message: String },

    /// The request exceeded its deadline.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// The service answered with a status that carries no change envelope.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed response: {message}")]
    Decode { message: String },
}

/// Errors describing how a running operation ended.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("{message}")]
    Timeout { message: String },

    #[error("{message}")]
    Canceled { message: String },

    #[error("{message}")]
    Busy { message: String },

    #[error("{message}")]
    Unsupported { message: String },

    #[error("{message}")]
    Service { message: String },

    #[error("{message}")]
    Application { message: String },
}

impl OperationError {
    /// Builds the cancellation error for a named operation.
    pub fn canceled(operation: &str) -> Self {
        OperationError::Canceled {
            message: format!("operation canceled: {operation}"),
        }
    }
}

/// A fault expressed directly in taxonomy terms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ChangeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ChangeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl StorageError {
    /// Maps this error onto the taxonomy.
    ///
    /// The first matching rule wins:
    ///
    /// | error | kind |
    /// |---|---|
    /// | taxonomy fault | its own kind |
    /// | forbidden | `Forbidden` |
    /// | unauthorized | `Unauthorized` |
    /// | malformed argument | `Argument` |
    /// | timeout | `Timeout` |
    /// | cancellation | `Canceled` |
    /// | store or transport failure | `Provider` |
    /// | unsupported capability | `Unsupported` |
    /// | not found | `NotFound` |
    /// | key collision | `Key` |
    /// | content validation | `Validation` |
    /// | revision conflict | `Conflict` |
    /// | busy | `Busy` |
    /// | application fault | `Application` |
    /// | anything else | `Service` |
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            StorageError::Change(err) => err.kind,
            StorageError::Access(AccessError::Forbidden { .. }) => ErrorKind::Forbidden,
            StorageError::Access(AccessError::Unauthorized { .. }) => ErrorKind::Unauthorized,
            StorageError::Validation(err) if err.is_argument() => ErrorKind::Argument,
            StorageError::Operation(OperationError::Timeout { .. })
            | StorageError::Transport(TransportError::Timeout { .. }) => ErrorKind::Timeout,
            StorageError::Operation(OperationError::Canceled { .. }) => ErrorKind::Canceled,
            StorageError::Backend(BackendError::UnsupportedCapability { .. })
            | StorageError::Operation(OperationError::Unsupported { .. }) => {
                ErrorKind::Unsupported
            }
            StorageError::Backend(_) | StorageError::Transport(_) => ErrorKind::Provider,
            StorageError::Resource(ResourceError::NotFound { .. }) => ErrorKind::NotFound,
            StorageError::Resource(ResourceError::Key { .. }) => ErrorKind::Key,
            StorageError::Validation(_) => ErrorKind::Validation,
            StorageError::Concurrency(_) => ErrorKind::Conflict,
            StorageError::Operation(OperationError::Busy { .. }) => ErrorKind::Busy,
            StorageError::Operation(OperationError::Application { .. }) => ErrorKind::Application,
            StorageError::Operation(OperationError::Service { .. }) => ErrorKind::Service,
        }
    }

    /// Builds the representative error for a kind, keeping the message.
    ///
    /// Returns `None` for [`ErrorKind::None`].
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        let err = match kind {
            ErrorKind::None => return None,
            ErrorKind::Argument => ValidationError::InvalidArgument { message }.into(),
            ErrorKind::Unauthorized => AccessError::Unauthorized { message }.into(),
            ErrorKind::Forbidden => AccessError::Forbidden { message }.into(),
            ErrorKind::NotFound => ResourceError::NotFound { message }.into(),
            ErrorKind::Key => ResourceError::Key { message }.into(),
            ErrorKind::Validation => ValidationError::Invalid { message }.into(),
            ErrorKind::Unsupported => OperationError::Unsupported { message }.into(),
            ErrorKind::Provider => BackendError::Internal {
                backend_name: "provider".to_string(),
                message,
                source: None,
            }
            .into(),
            ErrorKind::Conflict => ConcurrencyError::Conflict { message }.into(),
            ErrorKind::Busy => OperationError::Busy { message }.into(),
            ErrorKind::Canceled => OperationError::Canceled { message }.into(),
            ErrorKind::Timeout => OperationError::Timeout { message }.into(),
            ErrorKind::Service => OperationError::Service { message }.into(),
            ErrorKind::Application => OperationError::Application { message }.into(),
        };
        Some(err)
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.error_kind(),
            ErrorKind::Busy | ErrorKind::Timeout | ErrorKind::Provider
        )
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

#[cfg(feature = "remote")]
impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::Transport(TransportError::Timeout {
                message: err.to_string(),
            })
        } else if err.is_decode() {
            StorageError::Transport(TransportError::Decode {
                message: err.to_string(),
            })
        } else {
            StorageError::Transport(TransportError::Request {
                message: err.to_string(),
            })
        }
    }
}
