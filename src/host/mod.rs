//! In-process host runtime.
//!
//! Plays both ends of the bridge: the application side registers handlers
//! on a [`Messenger`], and the Dart side sends messages, collects replies
//! and answers host-originated calls. Replies and outbound messages are
//! queued as [`HostEvent`]s and delivered by [`SimulatedRuntime::pump`], the
//! way the platform thread posts to the engine. Hooks are installed through
//! [`HostRuntime`].

mod engine;
mod messenger;

use std::sync::mpsc::{self, Receiver};

use bytes::Bytes;

use crate::bridge::{BridgeHook, OutboundMessage, PlatformBridge, ReplyId, ResponseId};
use crate::channel::{ChannelHook, MethodCall, MethodCallHandler, MethodResult, StreamHandler};
use crate::codec::Value;
use crate::error::{BridgeError, HookError};
use crate::hooks::{HostRuntime, FLUTTER_JNI_SURFACE, METHOD_CHANNEL_SURFACE};

pub use engine::{DartEndpoint, NativeBridge, Reply};
pub use messenger::{Messenger, MessengerSink};

/// Work queued by the host for delivery to Dart.
#[derive(Debug)]
pub enum HostEvent {
    Reply {
        reply: ReplyId,
        payload: Option<Bytes>,
    },
    Dispatch(OutboundMessage),
}

/// Which hook surfaces the runtime exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surfaces {
    pub method_channel: bool,
    pub flutter_jni: bool,
}

impl Default for Surfaces {
    fn default() -> Self {
        Self {
            method_channel: true,
            flutter_jni: true,
        }
    }
}

pub struct SimulatedRuntime {
    native: NativeBridge,
    bridge_hook: Option<Box<dyn BridgeHook>>,
    events: Receiver<HostEvent>,
    surfaces: Surfaces,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self::with_surfaces(Surfaces::default())
    }

    /// A runtime whose registration API names are obfuscated, so only the
    /// raw bridge can be hooked.
    pub fn obfuscated() -> Self {
        Self::with_surfaces(Surfaces {
            method_channel: false,
            flutter_jni: true,
        })
    }

    pub fn with_surfaces(surfaces: Surfaces) -> Self {
        let (outbox, events) = mpsc::channel();
        Self {
            native: NativeBridge::new(Messenger::new(outbox)),
            bridge_hook: None,
            events,
            surfaces,
        }
    }

    pub fn dart(&self) -> &DartEndpoint {
        self.native.dart()
    }

    pub fn errors(&self) -> &[BridgeError] {
        self.native.errors()
    }

    // Application side.

    pub fn set_method_call_handler(
        &mut self,
        channel: &str,
        handler: impl MethodCallHandler + 'static,
    ) {
        self.native
            .messenger()
            .set_method_call_handler(channel, Box::new(handler));
    }

    pub fn set_stream_handler(&mut self, channel: &str, handler: impl StreamHandler + 'static) {
        self.native
            .messenger()
            .set_stream_handler(channel, Box::new(handler));
    }

    pub fn invoke_method(
        &mut self,
        channel: &str,
        call: MethodCall,
        callback: Option<Box<dyn MethodResult>>,
    ) {
        self.native.messenger().invoke_method(channel, call, callback);
        self.pump();
    }

    pub fn send_message(&mut self, channel: &str, message: Value) {
        self.native.messenger().send_message(channel, message);
        self.pump();
    }

    // Dart side.

    /// Sends a raw message to the host and delivers whatever it queued.
    pub fn send_raw(
        &mut self,
        channel: Option<&str>,
        payload: Option<Bytes>,
        expect_reply: bool,
    ) -> Option<ReplyId> {
        let message = self
            .native
            .dart_mut()
            .prepare(channel, payload, expect_reply);
        let reply = message.reply;
        match self.bridge_hook.as_mut() {
            Some(hook) => hook.handle_platform_message(&mut self.native, message),
            None => self.native.handle_platform_message(message),
        }
        self.pump();
        reply
    }

    /// Invokes `method` on `channel` and returns the reply, if the host has
    /// answered by the time the queue drains.
    pub fn call_method(&mut self, channel: &str, method: &str, arguments: Value) -> Option<Reply> {
        let payload = MethodCall::new(method, arguments).encode();
        let id = self.send_raw(Some(channel), Some(payload), true)?;
        self.reply(id).cloned()
    }

    pub fn listen(&mut self, channel: &str, arguments: Value) -> Option<Reply> {
        self.call_method(channel, "listen", arguments)
    }

    pub fn cancel(&mut self, channel: &str, arguments: Value) -> Option<Reply> {
        self.call_method(channel, "cancel", arguments)
    }

    pub fn reply(&self, id: ReplyId) -> Option<&Reply> {
        self.native.dart().reply(id)
    }

    /// Messages the host dispatched on `channel`, in delivery order.
    pub fn received_on<'a>(&'a self, channel: &'a str) -> impl Iterator<Item = &'a OutboundMessage> {
        self.native
            .dart()
            .received()
            .iter()
            .filter(move |m| m.channel == channel)
    }

    /// Dart's response to a host-originated call.
    pub fn respond_from_dart(&mut self, response: ResponseId, payload: Option<Bytes>) {
        match self.bridge_hook.as_mut() {
            Some(hook) => hook.handle_platform_message_response(&mut self.native, response, payload),
            None => self.native.handle_platform_message_response(response, payload),
        }
        self.pump();
    }

    /// Delivers queued replies and outbound messages in order.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                HostEvent::Reply { reply, payload } => {
                    let result = self
                        .native
                        .invoke_platform_message_response_callback(reply, payload);
                    self.native.record(result);
                }
                HostEvent::Dispatch(message) => match self.bridge_hook.as_mut() {
                    Some(hook) => hook.dispatch_platform_message(&mut self.native, message),
                    None => self.native.dispatch_platform_message(message),
                },
            }
        }
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for SimulatedRuntime {
    fn install_channel_hook(&mut self, hook: Box<dyn ChannelHook>) -> Result<(), HookError> {
        if !self.surfaces.method_channel {
            return Err(HookError::SurfaceUnavailable {
                surface: METHOD_CHANNEL_SURFACE,
            });
        }
        let messenger = self.native.messenger();
        if messenger.has_hook() {
            return Err(HookError::AlreadyHooked {
                surface: METHOD_CHANNEL_SURFACE,
            });
        }
        messenger.set_hook(hook);
        Ok(())
    }

    fn install_bridge_hook(&mut self, hook: Box<dyn BridgeHook>) -> Result<(), HookError> {
        if !self.surfaces.flutter_jni {
            return Err(HookError::SurfaceUnavailable {
                surface: FLUTTER_JNI_SURFACE,
            });
        }
        if self.bridge_hook.is_some() {
            return Err(HookError::AlreadyHooked {
                surface: FLUTTER_JNI_SURFACE,
            });
        }
        self.bridge_hook = Some(hook);
        Ok(())
    }
}
