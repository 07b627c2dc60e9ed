use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Header carrying the tenant of a forwarded call.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header carrying the correlation id of a forwarded call.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Header carrying the authenticated user of a forwarded call.
pub const USER_HEADER: &str = "x-user-id";

/// Configuration for providers that forward calls to a remote service.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tessera_persistence::backends::remote::RemoteConfig;
///
/// let config: RemoteConfig = serde_json::from_str(
///     r#"{"base_url": "https://cms.example.com/api", "timeout": "5s"}"#,
/// ).unwrap();
/// assert_eq!(config.timeout, Duration::from_secs(5));
/// assert_eq!(config.tenant_header, "x-tenant-id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Root URL every provider path is resolved against.
    pub base_url: String,

    /// Per-request timeout.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,

    #[serde(default = "default_correlation_header")]
    pub correlation_header: String,

    #[serde(default = "default_user_header")]
    pub user_header: String,

    /// Headers sent with every request (e.g. an API key).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_tenant_header() -> String {
    TENANT_HEADER.to_string()
}

fn default_correlation_header() -> String {
    CORRELATION_HEADER.to_string()
}

fn default_user_header() -> String {
    USER_HEADER.to_string()
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: default_timeout(),
            tenant_header: default_tenant_header(),
            correlation_header: default_correlation_header(),
            user_header: default_user_header(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: RemoteConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:8080"}"#).unwrap();
        assert_eq!(config, RemoteConfig::new("http://localhost:8080"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.correlation_header, CORRELATION_HEADER);
    }

    #[test]
    fn test_timeout_serializes_humanized() {
        let config = RemoteConfig::new("http://localhost")
            .with_timeout(Duration::from_millis(1500))
            .with_header("x-api-key", "secret");
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["timeout"], "1s 500ms");
        assert_eq!(value["headers"]["x-api-key"], "secret");

        let back: RemoteConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let result: Result<RemoteConfig, _> =
            serde_json::from_str(r#"{"base_url": "http://x", "timeout": "soon"}"#);
        assert!(result.is_err());
    }
}
