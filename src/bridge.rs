//! The raw message bridge between the Dart runtime and native host code.
//!
//! Messages here are opaque byte buffers keyed by channel name and numeric
//! reply/response identifiers. The named-channel API is layered on top.

use std::fmt;

use bytes::Bytes;

use crate::error::BridgeError;

/// Identifier correlating a Dart-to-host message with its single reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplyId(pub i32);

/// Identifier correlating a host-to-Dart message with Dart's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseId(pub i32);

/// Native handle of the buffer backing an inbound message; zero means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageData(pub u64);

impl MessageData {
    pub const NONE: Self = Self(0);

    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ReplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A Dart-to-host message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformMessage {
    /// `None` when the transport hands over a null name.
    pub channel: Option<String>,
    /// `None` for an empty message.
    pub payload: Option<Bytes>,
    /// `None` when the sender expects no reply.
    pub reply: Option<ReplyId>,
    pub message_data: MessageData,
}

/// A host-to-Dart message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    /// `None` for an empty message (end of an event stream).
    pub payload: Option<Bytes>,
    pub response: Option<ResponseId>,
}

impl OutboundMessage {
    /// Number of valid payload bytes.
    pub fn position(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }
}

/// Entry points of the native side of the bridge.
pub trait PlatformBridge {
    /// Dart-to-host message; the host answers through
    /// [`invoke_platform_message_response_callback`](Self::invoke_platform_message_response_callback).
    fn handle_platform_message(&mut self, message: PlatformMessage);

    /// Host-to-Dart message, possibly empty.
    fn dispatch_platform_message(&mut self, message: OutboundMessage);

    /// Dart's response to an earlier host-to-Dart message.
    fn handle_platform_message_response(&mut self, response: ResponseId, payload: Option<Bytes>);

    /// Deliver the host's reply for `reply` back to Dart.
    fn invoke_platform_message_response_callback(
        &mut self,
        reply: ReplyId,
        payload: Option<Bytes>,
    ) -> Result<(), BridgeError>;

    /// Release the native buffer of an inbound message.
    fn cleanup_message_data(&mut self, handle: MessageData) -> Result<(), BridgeError>;
}

/// Replacement implementation for the bridge's dispatch entry points.
///
/// Each method receives the original bridge so it can call through; the
/// defaults do exactly that.
pub trait BridgeHook: Send {
    fn handle_platform_message(&mut self, bridge: &mut dyn PlatformBridge, message: PlatformMessage) {
        bridge.handle_platform_message(message)
    }

    fn dispatch_platform_message(&mut self, bridge: &mut dyn PlatformBridge, message: OutboundMessage) {
        bridge.dispatch_platform_message(message)
    }

    fn handle_platform_message_response(
        &mut self,
        bridge: &mut dyn PlatformBridge,
        response: ResponseId,
        payload: Option<Bytes>,
    ) {
        bridge.handle_platform_message_response(response, payload)
    }
}
