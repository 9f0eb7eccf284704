use std::sync::Arc;

use crate::channel::{
    ChannelHook, EventSink, MethodCall, MethodCallHandler, MethodResult, StreamHandler,
};
use crate::codec::Value;

use super::render_value;

/// Direction of a method call relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Dart invoking a host handler.
    Inbound,
    /// Host invoking Dart.
    Outbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "dart->host",
            Direction::Outbound => "host->dart",
        }
    }
}

/// [`ChannelHook`] that wraps every handler, result, stream and sink in a
/// logging proxy.
#[derive(Debug, Clone, Default)]
pub struct ChannelMonitor;

impl ChannelMonitor {
    pub fn new() -> Self {
        Self
    }
}

impl ChannelHook for ChannelMonitor {
    fn set_method_call_handler(
        &mut self,
        channel: &str,
        handler: Box<dyn MethodCallHandler>,
    ) -> Box<dyn MethodCallHandler> {
        tracing::info!(channel, "method handler registered");
        Box::new(MonitoringMethodHandler::new(channel, handler))
    }

    fn set_stream_handler(
        &mut self,
        channel: &str,
        handler: Box<dyn StreamHandler>,
    ) -> Box<dyn StreamHandler> {
        tracing::info!(channel, "stream handler registered");
        Box::new(MonitoringStreamHandler::new(channel, handler))
    }

    fn invoke_method(
        &mut self,
        channel: &str,
        call: &MethodCall,
        callback: Option<Box<dyn MethodResult>>,
    ) -> Option<Box<dyn MethodResult>> {
        tracing::info!(
            channel,
            method = %call.method,
            arguments = %render_value(&call.arguments),
            expects_result = callback.is_some(),
            direction = Direction::Outbound.as_str(),
            "method call"
        );
        callback.map(|inner| {
            Box::new(MonitoringResult::new(channel, &call.method, Direction::Outbound, inner))
                as Box<dyn MethodResult>
        })
    }

    fn send_message(&mut self, channel: &str, message: &Value) {
        tracing::info!(
            channel,
            message = %render_value(message),
            direction = Direction::Outbound.as_str(),
            "basic message"
        );
    }
}

/// Logs each incoming call, then hands it to the original handler with a
/// [`MonitoringResult`].
pub struct MonitoringMethodHandler {
    channel: String,
    inner: Box<dyn MethodCallHandler>,
}

impl MonitoringMethodHandler {
    pub fn new(channel: impl Into<String>, inner: Box<dyn MethodCallHandler>) -> Self {
        Self {
            channel: channel.into(),
            inner,
        }
    }
}

impl MethodCallHandler for MonitoringMethodHandler {
    fn on_method_call(&mut self, call: MethodCall, result: Box<dyn MethodResult>) {
        tracing::info!(
            channel = %self.channel,
            method = %call.method,
            arguments = %render_value(&call.arguments),
            direction = Direction::Inbound.as_str(),
            "method call"
        );
        let result = MonitoringResult::new(&self.channel, &call.method, Direction::Inbound, result);
        self.inner.on_method_call(call, Box::new(result));
    }
}

/// Logs the answer to a call before passing it on.
pub struct MonitoringResult {
    channel: String,
    method: String,
    direction: Direction,
    inner: Box<dyn MethodResult>,
}

impl MonitoringResult {
    fn new(channel: &str, method: &str, direction: Direction, inner: Box<dyn MethodResult>) -> Self {
        Self {
            channel: channel.to_owned(),
            method: method.to_owned(),
            direction,
            inner,
        }
    }
}

impl MethodResult for MonitoringResult {
    fn success(self: Box<Self>, value: Value) {
        tracing::info!(
            channel = %self.channel,
            method = %self.method,
            direction = self.direction.as_str(),
            result = %render_value(&value),
            "result"
        );
        self.inner.success(value);
    }

    fn error(self: Box<Self>, code: String, message: Option<String>, details: Value) {
        tracing::info!(
            channel = %self.channel,
            method = %self.method,
            direction = self.direction.as_str(),
            code = %code,
            message = message.as_deref().unwrap_or(""),
            details = %render_value(&details),
            "error result"
        );
        self.inner.error(code, message, details);
    }

    fn not_implemented(self: Box<Self>) {
        tracing::info!(
            channel = %self.channel,
            method = %self.method,
            direction = self.direction.as_str(),
            "not implemented"
        );
        self.inner.not_implemented();
    }
}

/// Logs listen and cancel, and wraps the sink in a [`MonitoringEventSink`].
pub struct MonitoringStreamHandler {
    channel: String,
    inner: Box<dyn StreamHandler>,
}

impl MonitoringStreamHandler {
    pub fn new(channel: impl Into<String>, inner: Box<dyn StreamHandler>) -> Self {
        Self {
            channel: channel.into(),
            inner,
        }
    }
}

impl StreamHandler for MonitoringStreamHandler {
    fn on_listen(&mut self, arguments: Value, events: Arc<dyn EventSink>) {
        tracing::info!(channel = %self.channel, arguments = %render_value(&arguments), "listen");
        let sink = MonitoringEventSink::new(&self.channel, events);
        self.inner.on_listen(arguments, Arc::new(sink));
    }

    fn on_cancel(&mut self, arguments: Value) {
        tracing::info!(channel = %self.channel, arguments = %render_value(&arguments), "cancel");
        self.inner.on_cancel(arguments);
    }
}

pub struct MonitoringEventSink {
    channel: String,
    inner: Arc<dyn EventSink>,
}

impl MonitoringEventSink {
    pub fn new(channel: &str, inner: Arc<dyn EventSink>) -> Self {
        Self {
            channel: channel.to_owned(),
            inner,
        }
    }
}

impl EventSink for MonitoringEventSink {
    fn success(&self, event: Value) {
        tracing::info!(channel = %self.channel, event = %render_value(&event), "event");
        self.inner.success(event);
    }

    fn error(&self, code: String, message: Option<String>, details: Value) {
        tracing::info!(
            channel = %self.channel,
            code = %code,
            message = message.as_deref().unwrap_or(""),
            "error event"
        );
        self.inner.error(code, message, details);
    }

    fn end_of_stream(&self) {
        tracing::info!(channel = %self.channel, "end of stream");
        self.inner.end_of_stream();
    }
}
