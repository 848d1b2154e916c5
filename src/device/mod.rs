//! Device-level collaborators shared by every container: the token store and
//! the auth-change signal.

pub mod signal;
pub mod store;

pub use signal::{AuthChange, AuthSignal, AuthSubscription};
pub use store::{DeviceStore, FileDeviceStore, MemoryDeviceStore, StoreError, TOKEN_TTL_SECS};
