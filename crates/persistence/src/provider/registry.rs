//! Provider lookup by entity kind.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::info;

use super::Provider;
use crate::entity::Resource;
use crate::error::{OperationError, StorageResult};

type ErasedProvider = Box<dyn Any + Send + Sync>;

/// Providers keyed by [`Resource::KIND`].
///
/// A registry is assembled once at startup and read-only afterwards.
///
/// # Examples
///
/// ```no_run
/// # #[cfg(feature = "sqlite")]
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use tessera_persistence::backends::sqlite::SqliteStore;
/// use tessera_persistence::entities::{Content, User};
/// use tessera_persistence::provider::{LocalProvider, ProviderRegistry};
///
/// let store = Arc::new(SqliteStore::in_memory()?);
/// let registry = ProviderRegistry::builder()
///     .register::<User>(Arc::new(LocalProvider::<User, _>::new(store.clone())))
///     .register::<Content>(Arc::new(LocalProvider::<Content, _>::new(store)))
///     .build();
///
/// let users = registry.get::<User>()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, ErasedProvider>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// The provider for `E`.
    ///
    /// # Errors
    ///
    /// * `OperationError::Unsupported` - If no provider serves the kind
    pub fn get<E: Resource>(&self) -> StorageResult<Arc<dyn Provider<E>>> {
        self.providers
            .get(E::KIND)
            .and_then(|erased| erased.downcast_ref::<Arc<dyn Provider<E>>>())
            .cloned()
            .ok_or_else(|| {
                OperationError::Unsupported {
                    message: format!("no provider registered for kind '{}'", E::KIND),
                }
                .into()
            })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.providers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Builder for [`ProviderRegistry`].
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<&'static str, ErasedProvider>,
}

impl ProviderRegistryBuilder {
    /// Registers the provider for `E`, replacing any earlier one.
    pub fn register<E: Resource>(mut self, provider: Arc<dyn Provider<E>>) -> Self {
        self.providers.insert(E::KIND, Box::new(provider));
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}

static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();

/// Installs the process-wide registry.
///
/// Only the first call succeeds; later calls hand their registry back.
pub fn install_global(registry: ProviderRegistry) -> Result<(), ProviderRegistry> {
    let kinds = registry.kinds();
    GLOBAL.set(registry)?;
    info!(kinds = ?kinds, "installed provider registry");
    Ok(())
}

/// The process-wide registry, if one was installed.
pub fn global() -> Option<&'static ProviderRegistry> {
    GLOBAL.get()
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::sqlite::SqliteStore;
    use crate::entities::{Comment, Content, User};
    use crate::provider::{BackendKind, LocalProvider};
    use crate::result::ErrorKind;

    fn registry() -> ProviderRegistry {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        ProviderRegistry::builder()
            .register::<User>(Arc::new(LocalProvider::<User, _>::new(store.clone())))
            .register::<Content>(Arc::new(LocalProvider::<Content, _>::new(store)))
            .build()
    }

    #[test]
    fn test_lookup_by_kind() {
        let registry = registry();
        assert_eq!(registry.kinds(), ["content", "user"]);
        let users = registry.get::<User>().unwrap();
        assert_eq!(users.backend_kind(), BackendKind::Sqlite);
    }

    #[test]
    fn test_missing_kind_is_unsupported() {
        let err = registry().get::<Comment>().err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_global_installs_once() {
        let first = install_global(registry());
        let second = install_global(ProviderRegistry::default());
        assert!(first.is_ok() || global().is_some());
        assert!(second.is_err());
        assert!(global().unwrap().contains("user"));
    }
}
