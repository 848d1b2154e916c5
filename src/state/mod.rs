//! Screen-facing state containers.
//!
//! DESIGN
//! ======
//! Each container owns its fields outright and exposes them through read
//! accessors. Operations take `&mut self`, so two calls on the same
//! container cannot interleave and no lock is involved. Remote failures
//! never escape: they are flattened into `error_message` and the container
//! stays usable.
//!
//! While an operation is suspended the container is mutably borrowed, so a
//! UI cannot read its accessors. Every container therefore also publishes a
//! snapshot on a `tokio::sync::watch` channel after each observable step
//! (busy flag raised, optimistic message appended, streamed text grown).
//! Screens render from `subscribe()`; the accessors serve the owner between
//! operations.

pub mod auth;
pub mod chat;
pub mod conversations;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use auth::{AuthSnapshot, AuthState};
pub use chat::{ChatSnapshot, ChatState};
pub use conversations::{ConversationListSnapshot, ConversationListState};

use tokio::sync::watch;

/// A published snapshot that carries a busy flag.
pub(crate) trait Busy {
    fn set_loading(&mut self, loading: bool);
}

/// Holds a container's busy flag high for as long as it lives, mirroring
/// every change onto the container's snapshot channel.
///
/// Lowering happens in `Drop`, so the flag is released on success, on
/// failure, and when the owning future is cancelled mid-await.
pub(crate) struct BusyFlag<'a, S: Busy> {
    flag: &'a mut bool,
    published: &'a watch::Sender<S>,
}

impl<'a, S: Busy> BusyFlag<'a, S> {
    pub(crate) fn raise(flag: &'a mut bool, published: &'a watch::Sender<S>) -> Self {
        *flag = true;
        published.send_modify(|s| s.set_loading(true));
        Self { flag, published }
    }
}

impl<S: Busy> Drop for BusyFlag<'_, S> {
    fn drop(&mut self) {
        *self.flag = false;
        self.published.send_modify(|s| s.set_loading(false));
    }
}
