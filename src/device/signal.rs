//! Auth-change signal: an explicit subscription in place of a global event bus.
//!
//! DESIGN
//! ======
//! Whoever changes provisioning out-of-band (the HTTP client on a 401, a
//! settings screen, another process watcher) calls [`AuthSignal::notify`].
//! Interested containers hold an [`AuthSubscription`]; dropping it is the
//! unsubscribe. A lagging subscriber only needs to know *that* something
//! changed, so missed notifications collapse into one refresh.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const SIGNAL_CAPACITY: usize = 16;

/// Why provisioning state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    /// The server rejected the stored token and it was cleared.
    SessionExpired,
    /// Tokens were written or cleared by another component.
    TokensChanged,
}

/// Cloneable sender side. Cheap to pass to every component that may change auth.
#[derive(Debug, Clone)]
pub struct AuthSignal {
    tx: broadcast::Sender<AuthChange>,
}

impl Default for AuthSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Broadcast a change. Returns how many subscribers will see it.
    pub fn notify(&self, change: AuthChange) -> usize {
        match self.tx.send(change) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(?change, "auth change raised with no subscribers");
                0
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription { rx: self.tx.subscribe() }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiver side held for the lifetime of a container.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Consume every pending notification without waiting. Returns how many
    /// changes were observed, counting ones lost to lag.
    pub fn drain(&mut self) -> usize {
        let mut seen = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => seen += 1,
                Err(TryRecvError::Lagged(missed)) => {
                    seen += usize::try_from(missed).unwrap_or(usize::MAX);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return seen,
            }
        }
    }

    /// Wait for the next change. `None` once every [`AuthSignal`] is gone.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "auth subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "signal_test.rs"]
mod tests;
