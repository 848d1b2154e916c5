//! Auth-session state for the current device user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Screens read `is_authenticated` to choose between the login flow and the
//! main app. The device store stays the source of truth: this container
//! mirrors it on construction, on an explicit refresh, and whenever the
//! [`AuthSignal`] reports an out-of-band change.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use super::{Busy, BusyFlag};
use crate::api::{ApiError, AuthPayload, RemoteApi};
use crate::device::{AuthSignal, AuthSubscription, DeviceStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl Busy for AuthSnapshot {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

/// Authentication state: signed-in flag, busy flag, and the last error.
pub struct AuthState {
    api: Arc<dyn RemoteApi>,
    store: Arc<dyn DeviceStore>,
    subscription: Option<AuthSubscription>,
    is_authenticated: bool,
    is_loading: bool,
    error_message: Option<String>,
    published: watch::Sender<AuthSnapshot>,
}

impl AuthState {
    /// Subscribe to `signal` for the container's lifetime and mirror the store.
    #[must_use]
    pub fn new(api: Arc<dyn RemoteApi>, store: Arc<dyn DeviceStore>, signal: &AuthSignal) -> Self {
        let is_authenticated = store.is_provisioned();
        let (published, _) = watch::channel(AuthSnapshot { is_authenticated, ..AuthSnapshot::default() });
        Self {
            api,
            store,
            subscription: Some(signal.subscribe()),
            is_authenticated,
            is_loading: false,
            error_message: None,
            published,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            is_authenticated: self.is_authenticated,
            is_loading: self.is_loading,
            error_message: self.error_message.clone(),
        }
    }

    /// Follow the container's state while its operations are in flight.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.published.subscribe()
    }

    fn publish(&self) {
        self.published.send_replace(self.snapshot());
    }

    /// Re-read provisioning from the device store. An expired token reads as
    /// signed out.
    pub fn refresh_auth_state(&mut self) {
        self.is_authenticated = self.store.is_provisioned();
        self.publish();
    }

    /// Apply any auth changes raised since the last check, without waiting.
    /// Returns `true` if at least one arrived.
    pub fn sync_auth_changes(&mut self) -> bool {
        let seen = self.subscription.as_mut().map_or(0, AuthSubscription::drain);
        if seen == 0 {
            return false;
        }
        tracing::debug!(seen, "auth change observed");
        self.refresh_auth_state();
        true
    }

    /// Wait for the next auth change and refresh. Returns `false` once the
    /// container is unsubscribed or every signal sender is gone.
    pub async fn wait_for_auth_change(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.recv().await {
            Some(change) => {
                tracing::debug!(?change, "auth change observed");
                self.refresh_auth_state();
                true
            }
            None => false,
        }
    }

    /// Stop listening for auth changes. Dropping the container does the same.
    pub fn unsubscribe(&mut self) {
        self.subscription = None;
    }

    pub async fn login(&mut self, email: &str, password: &str) {
        let api = Arc::clone(&self.api);
        self.authenticate(async move { api.login(email, password).await })
            .await;
    }

    pub async fn register(&mut self, email: &str, password: &str, name: Option<&str>) {
        let api = Arc::clone(&self.api);
        self.authenticate(async move { api.register(email, password, name).await })
            .await;
    }

    pub async fn login_with_apple(&mut self, identity_token: &str) {
        let api = Arc::clone(&self.api);
        self.authenticate(async move { api.login_with_apple(identity_token).await })
            .await;
    }

    /// Forget the stored session. No network call.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear_tokens() {
            tracing::warn!(error = %e, "failed to clear stored tokens on logout");
        }
        self.is_loading = false;
        self.error_message = None;
        self.is_authenticated = false;
        self.publish();
    }

    async fn authenticate(&mut self, call: impl Future<Output = Result<AuthPayload, ApiError>>) {
        self.error_message = None;
        self.publish();
        let busy = BusyFlag::raise(&mut self.is_loading, &self.published);

        let outcome = match call.await {
            Ok(payload) => self
                .store
                .save_user_token(&payload.token, payload.expires_at)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        drop(busy);

        match outcome {
            Ok(()) => {
                tracing::info!("signed in");
                self.is_authenticated = true;
            }
            Err(message) => {
                tracing::debug!(error = %message, "sign-in failed");
                self.error_message = Some(message);
            }
        }
        self.publish();
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
