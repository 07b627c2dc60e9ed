//! Tenant identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tenant used when a caller does not name one.
pub const DEFAULT_TENANT: &str = "default";

const MAX_TENANT_LEN: usize = 64;

/// An opaque tenant identifier.
///
/// Every row a store keeps is scoped by tenant; two tenants never see each
/// other's entities. Identifiers are lower-case ASCII letters, digits, `-`, `_`
/// and `.`.
///
/// # Examples
///
/// ```
/// use tessera_persistence::tenant::TenantId;
///
/// let tenant: TenantId = "Acme-Corp".parse().unwrap();
/// assert_eq!(tenant.as_str(), "acme-corp");
/// assert!("no spaces".parse::<TenantId>().is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID from trusted input, lower-casing it.
    ///
    /// Use [`TenantId::parse`] for input that may be malformed.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_lowercase())
    }

    /// Parses and validates a tenant ID.
    pub fn parse(id: &str) -> Result<Self, ValidationError> {
        let normalized = id.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::InvalidArgument {
                message: "tenant id must not be empty".to_string(),
            });
        }
        if normalized.len() > MAX_TENANT_LEN {
            return Err(ValidationError::InvalidArgument {
                message: format!("tenant id exceeds {MAX_TENANT_LEN} characters"),
            });
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ValidationError::InvalidArgument {
                message: format!("tenant id contains invalid character {bad:?}"),
            });
        }
        Ok(Self(normalized))
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the default tenant.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
