//! Interception engine for the Flutter platform-channel protocol.
//!
//! The crate implements Flutter's standard message/method codec bit for bit
//! and builds on it a classifier for detection-plugin channels, proxies that
//! forge or drop their traffic, and an observation-only monitor. Hooks are
//! installed into a [`hooks::HostRuntime`]; with the `sim` feature an
//! in-process runtime drives the whole pipeline.

pub mod bridge;
pub mod channel;
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod forge;
pub mod hooks;
pub mod intercept;
pub mod monitor;

#[cfg(feature = "sim")]
pub mod host;

// Re-export key types at crate root for convenience.
pub use bridge::{BridgeHook, PlatformBridge, PlatformMessage, ReplyId};
pub use channel::{ChannelHook, EventSink, MethodCallHandler, MethodResult, StreamHandler};
pub use classify::{ChannelCategory, ChannelClassifier};
pub use codec::{Envelope, MethodCall, Value};
pub use config::{BridgeFallback, InterceptConfig};
pub use error::{Error, Result};
pub use forge::{ResponseForger, Verdict};
pub use hooks::{perform, HostRuntime, InstallReport};
pub use intercept::{BridgeInterceptor, RegistrationInterceptor};
pub use monitor::{BridgeMonitor, ChannelMonitor};

#[cfg(feature = "sim")]
pub use host::SimulatedRuntime;
