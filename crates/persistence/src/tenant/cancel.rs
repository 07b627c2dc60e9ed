//! Cooperative cancellation for provider calls.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable cancellation flag.
///
/// Every clone observes the same flag. Once [`cancel`](Self::cancel) is called
/// the flag stays set.
///
/// # Examples
///
/// ```
/// use tessera_persistence::tenant::CancelToken;
///
/// let token = CancelToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    signal: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Sets the flag and wakes every waiter.
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.signal.subscribe();
        // The sender lives as long as `self`, so `changed` only fails after drop.
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
