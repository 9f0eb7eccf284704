use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::channel::{EventSink, StreamHandler};
use crate::codec::Value;
use crate::monitor::render_value;

/// One listen-to-cancel lifetime of a blocked event stream.
///
/// The downstream sink is held only until the session is released; the
/// plugin may keep its [`BlockingEventSink`] alive past cancel.
pub struct StreamSession {
    channel: String,
    downstream: Mutex<Option<Arc<dyn EventSink>>>,
    blocked: AtomicUsize,
}

impl StreamSession {
    fn new(channel: &str, downstream: Arc<dyn EventSink>) -> Self {
        Self {
            channel: channel.to_owned(),
            downstream: Mutex::new(Some(downstream)),
            blocked: AtomicUsize::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn EventSink>>> {
        self.downstream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn downstream(&self) -> Option<Arc<dyn EventSink>> {
        self.slot().clone()
    }

    fn detach(&self) {
        self.slot().take();
    }

    /// True between listen and cancel.
    pub fn is_attached(&self) -> bool {
        self.downstream().is_some()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Events swallowed so far.
    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::Relaxed)
    }
}

/// Sink handed to a telemetry plugin in place of the real one.
///
/// Events and errors are logged and discarded. End of stream is forwarded so
/// the Dart-side subscription still closes, unless the session was already
/// released by cancel or a new listen.
pub struct BlockingEventSink {
    session: Arc<StreamSession>,
}

impl BlockingEventSink {
    pub fn new(session: Arc<StreamSession>) -> Self {
        Self { session }
    }
}

impl EventSink for BlockingEventSink {
    fn success(&self, event: Value) {
        self.session.blocked.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            channel = %self.session.channel,
            event = %render_value(&event),
            "[BLOCKED]"
        );
    }

    fn error(&self, code: String, message: Option<String>, _details: Value) {
        self.session.blocked.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            channel = %self.session.channel,
            code = %code,
            message = message.as_deref().unwrap_or(""),
            "[BLOCKED] error event"
        );
    }

    fn end_of_stream(&self) {
        let Some(downstream) = self.session.downstream() else {
            tracing::debug!(channel = %self.session.channel, "end of stream after release ignored");
            return;
        };
        tracing::debug!(channel = %self.session.channel, "end of stream forwarded");
        downstream.end_of_stream();
    }
}

/// Proxy around a telemetry plugin's stream handler.
pub struct BlockingStreamHandler {
    channel: String,
    inner: Box<dyn StreamHandler>,
    session: Option<Arc<StreamSession>>,
}

impl BlockingStreamHandler {
    pub fn new(channel: impl Into<String>, inner: Box<dyn StreamHandler>) -> Self {
        Self {
            channel: channel.into(),
            inner,
            session: None,
        }
    }

    /// The live session, between listen and cancel.
    pub fn session(&self) -> Option<&Arc<StreamSession>> {
        self.session.as_ref()
    }

    fn release(&mut self) {
        if let Some(session) = self.session.take() {
            session.detach();
            tracing::info!(
                channel = %self.channel,
                blocked = session.blocked(),
                "telemetry session released"
            );
        }
    }
}

impl StreamHandler for BlockingStreamHandler {
    fn on_listen(&mut self, arguments: Value, events: Arc<dyn EventSink>) {
        self.release();
        let session = Arc::new(StreamSession::new(&self.channel, events));
        self.session = Some(Arc::clone(&session));
        tracing::info!(channel = %self.channel, "telemetry stream intercepted");
        self.inner
            .on_listen(arguments, Arc::new(BlockingEventSink::new(session)));
    }

    fn on_cancel(&mut self, arguments: Value) {
        self.release();
        self.inner.on_cancel(arguments);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl EventSink for Recorder {
        fn success(&self, event: Value) {
            self.events.lock().unwrap().push(format!("success {}", render_value(&event)));
        }

        fn error(&self, code: String, _message: Option<String>, _details: Value) {
            self.events.lock().unwrap().push(format!("error {code}"));
        }

        fn end_of_stream(&self) {
            self.events.lock().unwrap().push("end".to_owned());
        }
    }

    /// Plugin that emits through whatever sink it was last given.
    #[derive(Default)]
    struct Plugin {
        sink: Arc<Mutex<Option<Arc<dyn EventSink>>>>,
        cancels: Arc<Mutex<usize>>,
    }

    impl StreamHandler for Plugin {
        fn on_listen(&mut self, _arguments: Value, events: Arc<dyn EventSink>) {
            *self.sink.lock().unwrap() = Some(events);
        }

        fn on_cancel(&mut self, _arguments: Value) {
            *self.cancels.lock().unwrap() += 1;
        }
    }

    #[test]
    fn events_are_swallowed_and_end_of_stream_forwarded() {
        let plugin = Plugin::default();
        let sink = Arc::clone(&plugin.sink);
        let mut handler = BlockingStreamHandler::new("talsec.app/freerasp/events", Box::new(plugin));
        let downstream = Arc::new(Recorder::default());

        handler.on_listen(Value::Null, downstream.clone());
        let emitter = sink.lock().unwrap().clone().unwrap();
        emitter.success(Value::from("privilegedAccess"));
        emitter.error("threat".to_owned(), None, Value::Null);
        assert_eq!(handler.session().unwrap().blocked(), 2);
        assert!(downstream.events.lock().unwrap().is_empty());

        emitter.end_of_stream();
        assert_eq!(*downstream.events.lock().unwrap(), vec!["end".to_owned()]);
    }

    #[test]
    fn cancel_releases_session_and_reaches_plugin() {
        let plugin = Plugin::default();
        let cancels = Arc::clone(&plugin.cancels);
        let mut handler = BlockingStreamHandler::new("freerasp", Box::new(plugin));

        handler.on_listen(Value::Null, Arc::new(Recorder::default()));
        assert!(handler.session().is_some());
        handler.on_cancel(Value::Null);
        assert!(handler.session().is_none());
        assert_eq!(*cancels.lock().unwrap(), 1);

        handler.on_cancel(Value::Null);
        assert_eq!(*cancels.lock().unwrap(), 2);
    }

    #[test]
    fn cancel_detaches_downstream_from_retained_sink() {
        let plugin = Plugin::default();
        let sink = Arc::clone(&plugin.sink);
        let mut handler = BlockingStreamHandler::new("freerasp", Box::new(plugin));
        let downstream = Arc::new(Recorder::default());

        handler.on_listen(Value::Null, downstream.clone());
        let retained = sink.lock().unwrap().clone().unwrap();
        let session = Arc::clone(handler.session().unwrap());
        handler.on_cancel(Value::Null);

        assert_eq!(Arc::strong_count(&downstream), 1);
        assert!(!session.is_attached());
        retained.end_of_stream();
        retained.success(Value::from("late"));
        assert!(downstream.events.lock().unwrap().is_empty());
    }

    #[test]
    fn relisten_replaces_session() {
        let mut handler = BlockingStreamHandler::new("freerasp", Box::new(Plugin::default()));
        handler.on_listen(Value::Null, Arc::new(Recorder::default()));
        let first = Arc::clone(handler.session().unwrap());
        handler.on_listen(Value::Null, Arc::new(Recorder::default()));
        assert!(!Arc::ptr_eq(&first, handler.session().unwrap()));
        assert_eq!(first.channel(), "freerasp");
        assert!(!first.is_attached());
        assert!(handler.session().unwrap().is_attached());
    }
}
