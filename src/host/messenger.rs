use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use bytes::Bytes;

use crate::bridge::{OutboundMessage, ReplyId, ResponseId};
use crate::channel::{
    ChannelHook, EventSink, MethodCall, MethodCallHandler, MethodResult, StreamHandler,
};
use crate::codec::{
    decode_envelope, decode_method_call, encode_error_envelope, encode_success_envelope,
    encode_value, Envelope, Value,
};

use super::HostEvent;

enum Registration {
    Method(Box<dyn MethodCallHandler>),
    Stream {
        handler: Box<dyn StreamHandler>,
        active: Option<Arc<MessengerSink>>,
    },
}

/// Host-side channel registry.
///
/// Decodes inbound messages for the registered handler and queues replies
/// and outbound messages on the host event queue.
pub struct Messenger {
    registrations: HashMap<String, Registration>,
    hook: Option<Box<dyn ChannelHook>>,
    outbox: Sender<HostEvent>,
    pending: HashMap<ResponseId, Box<dyn MethodResult>>,
    next_response: i32,
}

impl Messenger {
    pub(crate) fn new(outbox: Sender<HostEvent>) -> Self {
        Self {
            registrations: HashMap::new(),
            hook: None,
            outbox,
            pending: HashMap::new(),
            next_response: 1,
        }
    }

    pub(crate) fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    pub(crate) fn set_hook(&mut self, hook: Box<dyn ChannelHook>) {
        self.hook = Some(hook);
    }

    pub fn set_method_call_handler(&mut self, channel: &str, handler: Box<dyn MethodCallHandler>) {
        let handler = match self.hook.as_mut() {
            Some(hook) => hook.set_method_call_handler(channel, handler),
            None => handler,
        };
        self.registrations
            .insert(channel.to_owned(), Registration::Method(handler));
    }

    pub fn set_stream_handler(&mut self, channel: &str, handler: Box<dyn StreamHandler>) {
        let handler = match self.hook.as_mut() {
            Some(hook) => hook.set_stream_handler(channel, handler),
            None => handler,
        };
        let previous = self.registrations.insert(
            channel.to_owned(),
            Registration::Stream {
                handler,
                active: None,
            },
        );
        if let Some(Registration::Stream {
            active: Some(sink), ..
        }) = previous
        {
            sink.close();
        }
    }

    /// Host-to-Dart method call. With a callback, the call carries a
    /// response id and the callback runs when Dart responds.
    pub fn invoke_method(
        &mut self,
        channel: &str,
        call: MethodCall,
        callback: Option<Box<dyn MethodResult>>,
    ) {
        let callback = match self.hook.as_mut() {
            Some(hook) => hook.invoke_method(channel, &call, callback),
            None => callback,
        };
        let response = match callback {
            Some(callback) => {
                let id = ResponseId(self.next_response);
                self.next_response = self.next_response.wrapping_add(1);
                self.pending.insert(id, callback);
                Some(id)
            }
            None => None,
        };
        self.post(HostEvent::Dispatch(OutboundMessage {
            channel: channel.to_owned(),
            payload: Some(call.encode()),
            response,
        }));
    }

    /// Host-to-Dart basic message.
    pub fn send_message(&mut self, channel: &str, message: Value) {
        if let Some(hook) = self.hook.as_mut() {
            hook.send_message(channel, &message);
        }
        self.post(HostEvent::Dispatch(OutboundMessage {
            channel: channel.to_owned(),
            payload: Some(encode_value(&message)),
            response: None,
        }));
    }

    /// Dispatches one Dart-to-host message to its handler.
    pub(crate) fn handle_message(
        &mut self,
        channel: Option<&str>,
        payload: Option<Bytes>,
        reply: Option<ReplyId>,
    ) {
        let registration = match channel {
            Some(name) => self.registrations.get_mut(name),
            None => None,
        };
        let Some(registration) = registration else {
            tracing::debug!(channel = channel.unwrap_or("<null>"), "no handler registered");
            post_reply(&self.outbox, reply, None);
            return;
        };
        let channel = channel.unwrap_or_default();

        let call = match decode_method_call(payload.as_deref().unwrap_or_default()) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(channel, error = %e, "undecodable method call");
                let envelope = encode_error_envelope("error", Some(&e.to_string()), &Value::Null);
                post_reply(&self.outbox, reply, Some(envelope));
                return;
            }
        };

        match registration {
            Registration::Method(handler) => {
                let result = ReplyResult::new(reply, self.outbox.clone());
                handler.on_method_call(call, Box::new(result));
            }
            Registration::Stream { handler, active } => {
                let envelope = match call.method.as_str() {
                    "listen" => {
                        if let Some(previous) = active.take() {
                            previous.close();
                            handler.on_cancel(Value::Null);
                        }
                        let sink = Arc::new(MessengerSink::new(channel, self.outbox.clone()));
                        *active = Some(Arc::clone(&sink));
                        handler.on_listen(call.arguments, sink);
                        Some(encode_success_envelope(&Value::Null))
                    }
                    "cancel" => match active.take() {
                        Some(previous) => {
                            previous.close();
                            handler.on_cancel(call.arguments);
                            Some(encode_success_envelope(&Value::Null))
                        }
                        None => Some(encode_error_envelope(
                            "error",
                            Some("No active stream to cancel"),
                            &Value::Null,
                        )),
                    },
                    _ => None,
                };
                post_reply(&self.outbox, reply, envelope);
            }
        }
    }

    /// Dart's response to an earlier [`invoke_method`](Self::invoke_method).
    pub(crate) fn handle_response(&mut self, response: ResponseId, payload: Option<Bytes>) {
        let Some(callback) = self.pending.remove(&response) else {
            tracing::warn!(response_id = response.0, "response for unknown id");
            return;
        };
        let Some(bytes) = payload.filter(|p| !p.is_empty()) else {
            callback.not_implemented();
            return;
        };
        match decode_envelope(&bytes) {
            Ok(Envelope::Success(value)) => callback.success(value),
            Ok(Envelope::Error {
                code,
                message,
                details,
                ..
            }) => callback.error(code, message, details),
            Err(e) => {
                tracing::warn!(response_id = response.0, error = %e, "undecodable response");
                callback.error("error".to_owned(), Some(e.to_string()), Value::Null);
            }
        }
    }

    fn post(&self, event: HostEvent) {
        post(&self.outbox, event);
    }
}

fn post(outbox: &Sender<HostEvent>, event: HostEvent) {
    if outbox.send(event).is_err() {
        tracing::debug!("host event queue closed");
    }
}

fn post_reply(outbox: &Sender<HostEvent>, reply: Option<ReplyId>, payload: Option<Bytes>) {
    if let Some(reply) = reply {
        post(outbox, HostEvent::Reply { reply, payload });
    }
}

/// Result callback bound to one reply id.
///
/// Dropping it unanswered sends an empty reply.
struct ReplyResult {
    reply: Option<ReplyId>,
    outbox: Sender<HostEvent>,
    answered: bool,
}

impl ReplyResult {
    fn new(reply: Option<ReplyId>, outbox: Sender<HostEvent>) -> Self {
        Self {
            reply,
            outbox,
            answered: false,
        }
    }

    fn answer(&mut self, payload: Option<Bytes>) {
        self.answered = true;
        post_reply(&self.outbox, self.reply, payload);
    }
}

impl MethodResult for ReplyResult {
    fn success(mut self: Box<Self>, value: Value) {
        self.answer(Some(encode_success_envelope(&value)));
    }

    fn error(mut self: Box<Self>, code: String, message: Option<String>, details: Value) {
        self.answer(Some(encode_error_envelope(&code, message.as_deref(), &details)));
    }

    fn not_implemented(mut self: Box<Self>) {
        self.answer(None);
    }
}

impl Drop for ReplyResult {
    fn drop(&mut self) {
        if !self.answered {
            tracing::debug!(reply_id = self.reply.map(|r| r.0), "result dropped unanswered");
            self.answer(None);
        }
    }
}

/// Event sink of one listen on an event channel.
pub struct MessengerSink {
    channel: String,
    outbox: Sender<HostEvent>,
    closed: AtomicBool,
}

impl MessengerSink {
    fn new(channel: &str, outbox: Sender<HostEvent>) -> Self {
        Self {
            channel: channel.to_owned(),
            outbox,
            closed: AtomicBool::new(false),
        }
    }

    /// Detaches the sink; later events are ignored.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn emit(&self, payload: Option<Bytes>) {
        post(
            &self.outbox,
            HostEvent::Dispatch(OutboundMessage {
                channel: self.channel.clone(),
                payload,
                response: None,
            }),
        );
    }
}

impl EventSink for MessengerSink {
    fn success(&self, event: Value) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.emit(Some(encode_success_envelope(&event)));
    }

    fn error(&self, code: String, message: Option<String>, details: Value) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.emit(Some(encode_error_envelope(&code, message.as_deref(), &details)));
    }

    fn end_of_stream(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.emit(None);
    }
}
