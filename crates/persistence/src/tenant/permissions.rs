//! Tenant permission types.
//!
//! This module defines the permission model for provider operations, controlling
//! what a request context is allowed to do and to which entity kinds.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Operations a provider performs on behalf of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Fetch a single entity.
    Read,
    /// Query a collection.
    Search,
    /// Insert a new entity.
    Create,
    /// Modify an existing entity.
    Update,
    /// Transition an entity to the deleted state.
    Delete,
}

impl Operation {
    /// Returns `true` for operations that write.
    pub fn is_write(self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Search => write!(f, "search"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Permissions granted to a request context.
///
/// # Examples
///
/// ```
/// use tessera_persistence::tenant::{Operation, TenantPermissions};
///
/// let read_only = TenantPermissions::read_only();
/// assert!(read_only.can_perform(Operation::Search, "content"));
/// assert!(!read_only.can_perform(Operation::Update, "content"));
///
/// let comments = TenantPermissions::builder()
///     .allow_kinds(vec!["comment"])
///     .build();
/// assert!(comments.can_perform(Operation::Create, "comment"));
/// assert!(!comments.can_perform(Operation::Read, "user"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantPermissions {
    /// Allowed operations. If None, all operations are allowed.
    allowed_operations: Option<HashSet<Operation>>,

    /// Allowed entity kinds. If None, all kinds are allowed.
    allowed_kinds: Option<HashSet<String>>,

    /// Whether writes need an authenticated user on the context.
    require_user_for_writes: bool,
}

impl TenantPermissions {
    /// Creates permissions with full access to every operation and kind.
    pub fn full_access() -> Self {
        Self {
            allowed_operations: None,
            allowed_kinds: None,
            require_user_for_writes: false,
        }
    }

    /// Creates read-only permissions (read and search).
    pub fn read_only() -> Self {
        Self {
            allowed_operations: Some([Operation::Read, Operation::Search].into_iter().collect()),
            allowed_kinds: None,
            require_user_for_writes: false,
        }
    }

    /// Creates a builder for custom permissions.
    pub fn builder() -> TenantPermissionsBuilder {
        TenantPermissionsBuilder::new()
    }

    /// Returns `true` if the operation is permitted on the kind.
    pub fn can_perform(&self, operation: Operation, kind: &str) -> bool {
        if let Some(ref allowed_ops) = self.allowed_operations {
            if !allowed_ops.contains(&operation) {
                return false;
            }
        }

        if let Some(ref allowed_kinds) = self.allowed_kinds {
            if !allowed_kinds.contains(kind) {
                return false;
            }
        }

        true
    }

    /// Checks an operation for a caller, who may be anonymous.
    ///
    /// Anonymous writes fail as unauthorized when writes require a user;
    /// everything else that is not permitted fails as forbidden.
    pub fn check(
        &self,
        operation: Operation,
        kind: &str,
        user_id: Option<&str>,
    ) -> Result<(), AccessError> {
        if operation.is_write() && self.require_user_for_writes && user_id.is_none() {
            return Err(AccessError::Unauthorized {
                message: format!("{operation} on {kind} requires an authenticated user"),
            });
        }
        if !self.can_perform(operation, kind) {
            return Err(AccessError::Forbidden {
                message: format!("operation {operation} not permitted on {kind}"),
            });
        }
        Ok(())
    }

    /// Returns `true` if writes need an authenticated user.
    pub fn requires_user_for_writes(&self) -> bool {
        self.require_user_for_writes
    }
}

impl Default for TenantPermissions {
    fn default() -> Self {
        Self::full_access()
    }
}

/// Builder for creating custom tenant permissions.
#[derive(Default)]
pub struct TenantPermissionsBuilder {
    allowed_operations: Option<HashSet<Operation>>,
    allowed_kinds: Option<HashSet<String>>,
    require_user_for_writes: bool,
}

impl TenantPermissionsBuilder {
    /// Creates a new builder with full access.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the allowed operations.
    pub fn allow_operations(mut self, operations: Vec<Operation>) -> Self {
        self.allowed_operations = Some(operations.into_iter().collect());
        self
    }

    /// Sets the allowed entity kinds.
    pub fn allow_kinds(mut self, kinds: Vec<&str>) -> Self {
        self.allowed_kinds = Some(kinds.into_iter().map(String::from).collect());
        self
    }

    /// Sets whether writes need an authenticated user.
    pub fn require_user_for_writes(mut self, required: bool) -> Self {
        self.require_user_for_writes = required;
        self
    }

    /// Builds the permissions.
    pub fn build(self) -> TenantPermissions {
        TenantPermissions {
            allowed_operations: self.allowed_operations,
            allowed_kinds: self.allowed_kinds,
            require_user_for_writes: self.require_user_for_writes,
        }
    }
}
