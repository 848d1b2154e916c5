//! ClawPhones client core.
//!
//! SYSTEM CONTEXT
//! ==============
//! Headless state containers behind the mobile screens: auth, a single chat
//! conversation, and the conversation list. They share one [`api::RemoteApi`]
//! and one [`device::DeviceStore`]; nothing else couples them. The on-device
//! [`vision::VisionDetector`] sits beside them and never touches the network.

pub mod api;
pub mod config;
pub mod device;
pub mod state;
pub mod vision;

pub use api::{ApiError, HttpApi, RemoteApi};
pub use config::ClientConfig;
pub use device::{AuthChange, AuthSignal, DeviceStore, FileDeviceStore, MemoryDeviceStore};
pub use state::{AuthSnapshot, AuthState, ChatSnapshot, ChatState, ConversationListSnapshot, ConversationListState};
pub use vision::{Detection, DetectionKind, VisionDetector};
