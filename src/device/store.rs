//! Device token store, the single source of truth for "is provisioned".
//!
//! DESIGN
//! ======
//! One store instance is created at process start and shared as
//! `Arc<dyn DeviceStore>`. Reads and writes are single-field and atomic;
//! there is no transactional layer. Tokens are trimmed on write and a blank
//! token is refused, so `token()` never yields an empty string.
//!
//! A token may carry an expiry in epoch seconds. Once it has passed the
//! device is no longer provisioned and the token is dropped on the next check.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Received an empty session token")]
    EmptyToken,
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Lifetime assumed for a token the server issued without an expiry.
pub const TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Process-wide token storage consumed by the auth container and the HTTP client.
pub trait DeviceStore: Send + Sync {
    /// The stored session token, if any.
    fn token(&self) -> Option<String>;

    /// Epoch seconds at which the stored token stops being valid, if known.
    fn token_expires_at(&self) -> Option<i64>;

    /// Whether the device holds a session token that has not expired.
    /// An expired token is cleared as a side effect.
    fn is_provisioned(&self) -> bool {
        if self.token().is_none() {
            return false;
        }
        if !is_expired(self.token_expires_at(), now_epoch()) {
            return true;
        }
        tracing::info!("stored token expired");
        if let Err(e) = self.clear_tokens() {
            tracing::warn!(error = %e, "failed to clear expired token");
        }
        false
    }

    /// Persist a user session token and its expiry, replacing any previous
    /// one. A missing or non-positive expiry is stored as unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyToken`] for a blank token, or an I/O error
    /// from a persistent backend.
    fn save_user_token(&self, token: &str, expires_at: Option<i64>) -> Result<(), StoreError>;

    /// Forget every stored token.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from a persistent backend.
    fn clear_tokens(&self) -> Result<(), StoreError>;
}

#[must_use]
pub fn now_epoch() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// `true` once `now` has reached a known, positive expiry.
#[must_use]
pub fn is_expired(expires_at: Option<i64>, now: i64) -> bool {
    expires_at.is_some_and(|at| at > 0 && now >= at)
}

/// The server's expiry when it sent a usable one, otherwise `now` plus the default TTL.
#[must_use]
pub fn normalize_expiry(raw: Option<i64>, now: i64) -> i64 {
    raw.filter(|at| *at > 0).unwrap_or(now + TOKEN_TTL_SECS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredToken {
    token: String,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn new(token: &str, expires_at: Option<i64>) -> Result<Self, StoreError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyToken);
        }
        Ok(Self { token: trimmed.to_owned(), expires_at: expires_at.filter(|at| *at > 0) })
    }
}

fn lock_slot(slot: &Mutex<Option<StoredToken>>) -> MutexGuard<'_, Option<StoredToken>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-process store. Forgets everything when the process exits.
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    slot: Mutex<Option<StoredToken>>,
}

impl MemoryDeviceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out provisioned. Blank tokens leave it empty.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self { slot: Mutex::new(StoredToken::new(token, None).ok()) }
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn token(&self) -> Option<String> {
        lock_slot(&self.slot).as_ref().map(|s| s.token.clone())
    }

    fn token_expires_at(&self) -> Option<i64> {
        lock_slot(&self.slot).as_ref().and_then(|s| s.expires_at)
    }

    fn save_user_token(&self, token: &str, expires_at: Option<i64>) -> Result<(), StoreError> {
        let stored = StoredToken::new(token, expires_at)?;
        *lock_slot(&self.slot) = Some(stored);
        Ok(())
    }

    fn clear_tokens(&self) -> Result<(), StoreError> {
        *lock_slot(&self.slot) = None;
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    saved_at: Option<i64>,
}

/// JSON-file store with an in-memory cache, used by the CLI so a session
/// survives between invocations.
#[derive(Debug)]
pub struct FileDeviceStore {
    path: PathBuf,
    cached: Mutex<Option<StoredToken>>,
}

impl FileDeviceStore {
    /// Open the store at `path`, loading any token already written there.
    /// A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let stored = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let file: TokenFile = serde_json::from_str(&raw)?;
                file.token.and_then(|t| StoredToken::new(&t, file.expires_at).ok())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), provisioned = stored.is_some(), "token store opened");
        Ok(Self { path, cached: Mutex::new(stored) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceStore for FileDeviceStore {
    fn token(&self) -> Option<String> {
        lock_slot(&self.cached).as_ref().map(|s| s.token.clone())
    }

    fn token_expires_at(&self) -> Option<i64> {
        lock_slot(&self.cached).as_ref().and_then(|s| s.expires_at)
    }

    fn save_user_token(&self, token: &str, expires_at: Option<i64>) -> Result<(), StoreError> {
        let stored = StoredToken::new(token, expires_at)?;
        let mut cached = lock_slot(&self.cached);
        let file = TokenFile {
            token: Some(stored.token.clone()),
            expires_at: stored.expires_at,
            saved_at: Some(now_epoch()),
        };
        write_token_file(&self.path, &file)?;
        *cached = Some(stored);
        Ok(())
    }

    fn clear_tokens(&self) -> Result<(), StoreError> {
        let mut cached = lock_slot(&self.cached);
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *cached = None;
        Ok(())
    }
}

fn write_token_file(path: &Path, file: &TokenFile) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(file)?;
    std::fs::write(path, body)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
