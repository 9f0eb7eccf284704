//! Handler shapes of the named-channel API.
//!
//! These mirror what the host runtime expects an application to register:
//! a method-call handler answering through a one-shot result callback, and a
//! stream handler feeding an event sink.

use std::sync::Arc;

use crate::codec::Value;

pub use crate::codec::MethodCall;

/// One-shot callback answering a method call.
///
/// Every method consumes the callback, so a call is answered at most once.
pub trait MethodResult: Send {
    fn success(self: Box<Self>, value: Value);
    fn error(self: Box<Self>, code: String, message: Option<String>, details: Value);
    fn not_implemented(self: Box<Self>);
}

/// Handler registered for a method channel.
///
/// The host owns each registered handler exclusively and delivers messages
/// for a channel one at a time, so `&mut self` needs no lock. A host that
/// dispatched one channel's messages concurrently would break this.
pub trait MethodCallHandler: Send {
    fn on_method_call(&mut self, call: MethodCall, result: Box<dyn MethodResult>);
}

impl<F> MethodCallHandler for F
where
    F: FnMut(MethodCall, Box<dyn MethodResult>) + Send,
{
    fn on_method_call(&mut self, call: MethodCall, result: Box<dyn MethodResult>) {
        self(call, result)
    }
}

/// Downstream end of an event stream. Shared with the app, which may emit
/// from any thread.
pub trait EventSink: Send + Sync {
    fn success(&self, event: Value);
    fn error(&self, code: String, message: Option<String>, details: Value);
    fn end_of_stream(&self);
}

/// Handler registered for an event channel.
///
/// Listen and cancel arrive serialized per channel, like method calls.
/// Events leave through the shared [`EventSink`], which is why only the
/// sink has to be `Sync`.
pub trait StreamHandler: Send {
    fn on_listen(&mut self, arguments: Value, events: Arc<dyn EventSink>);
    fn on_cancel(&mut self, arguments: Value);
}

/// Interposition point on the named-channel API.
///
/// The registration methods receive the handler the application is about to
/// install and return the one that actually gets installed. The defaults
/// install the original unchanged.
pub trait ChannelHook: Send {
    fn set_method_call_handler(
        &mut self,
        channel: &str,
        handler: Box<dyn MethodCallHandler>,
    ) -> Box<dyn MethodCallHandler> {
        let _ = channel;
        handler
    }

    fn set_stream_handler(
        &mut self,
        channel: &str,
        handler: Box<dyn StreamHandler>,
    ) -> Box<dyn StreamHandler> {
        let _ = channel;
        handler
    }

    /// Host-to-Dart method invocation; may replace the result callback.
    fn invoke_method(
        &mut self,
        channel: &str,
        call: &MethodCall,
        callback: Option<Box<dyn MethodResult>>,
    ) -> Option<Box<dyn MethodResult>> {
        let _ = (channel, call);
        callback
    }

    /// Host-to-Dart basic message.
    fn send_message(&mut self, channel: &str, message: &Value) {
        let _ = (channel, message);
    }
}
