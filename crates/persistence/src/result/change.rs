//! The outcome of a mutation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use super::{ChangeMethod, ErrorKind};
use crate::error::{ChangeError, StorageError, StorageResult};

/// How a failed result is turned back into an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fidelity {
    /// The representative variant of [`StorageError`] for each kind.
    #[default]
    Natural,
    /// Always a [`ChangeError`] carrying the kind.
    Taxonomy,
}

/// Result of a save, delete or patch.
///
/// Serializes as the mutation envelope `{"state", "code", "message", "data"}`.
///
/// # Examples
///
/// ```
/// use tessera_persistence::error::{StorageError, ValidationError};
/// use tessera_persistence::result::{ChangeMethod, ChangingResultInfo, ErrorKind};
///
/// let err: StorageError = ValidationError::InvalidArgument { message: "bad".into() }.into();
/// let info = ChangingResultInfo::from_error(&err);
///
/// assert_eq!(info.method(), ChangeMethod::Invalid);
/// assert_eq!(info.error_kind(), ErrorKind::Argument);
/// assert_eq!(info.message(), Some("bad"));
/// assert!(!info.is_successful());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangingResultInfo {
    #[serde(rename = "state", default)]
    method: ChangeMethod,

    #[serde(rename = "code", default)]
    kind: ErrorKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl ChangingResultInfo {
    /// A result with the given method and no error.
    pub fn new(method: ChangeMethod) -> Self {
        Self {
            method,
            kind: ErrorKind::None,
            message: None,
            data: None,
        }
    }

    /// The result of a save that had nothing to write.
    pub fn unchanged() -> Self {
        Self::new(ChangeMethod::Unchanged)
    }

    /// A rejected mutation of the given kind.
    pub fn invalid(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            method: ChangeMethod::Invalid,
            kind,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Classifies an error into a rejected result.
    ///
    /// Errors that fall through to [`ErrorKind::Service`] are logged.
    pub fn from_error(err: &StorageError) -> Self {
        let kind = err.error_kind();
        if kind == ErrorKind::Service {
            error!(error = %err, "unclassified fault in change operation");
        }
        Self::invalid(kind, err.to_string())
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method(&self) -> ChangeMethod {
        self.method
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Takes the data payload out of the result.
    pub fn take_data(&mut self) -> Option<Value> {
        self.data.take()
    }

    /// Returns `true` for Add, Update, MemberModify, Remove and Unchanged.
    pub fn is_successful(&self) -> bool {
        self.method.is_successful()
    }

    /// Rebuilds the error this result stands for.
    ///
    /// Only `Invalid` and `Unknown` results with a kind other than
    /// [`ErrorKind::None`] produce an error.
    pub fn to_error(&self, fidelity: Fidelity) -> Option<StorageError> {
        if !matches!(self.method, ChangeMethod::Invalid | ChangeMethod::Unknown)
            || self.kind == ErrorKind::None
        {
            return None;
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("change rejected: {}", self.kind));
        match fidelity {
            Fidelity::Natural => StorageError::from_kind(self.kind, message),
            Fidelity::Taxonomy => Some(ChangeError::new(self.kind, message).into()),
        }
    }

    /// Passes the result through, or fails with the error it stands for.
    pub fn check(self, fidelity: Fidelity) -> StorageResult<Self> {
        match self.to_error(fidelity) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

impl Default for ChangingResultInfo {
    fn default() -> Self {
        Self::new(ChangeMethod::Unknown)
    }
}

impl From<StorageError> for ChangingResultInfo {
    fn from(err: StorageError) -> Self {
        Self::from_error(&err)
    }
}

impl From<ChangeMethod> for ChangingResultInfo {
    fn from(method: ChangeMethod) -> Self {
        Self::new(method)
    }
}
