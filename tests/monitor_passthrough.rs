#![cfg(feature = "sim")]

//! The monitor profile must not change any observable outcome.

use std::sync::{Arc, Mutex};

use bytes::Bytes;

use flutter_channel_interceptor::bridge::OutboundMessage;
use flutter_channel_interceptor::channel::{EventSink, MethodCall, MethodResult, StreamHandler};
use flutter_channel_interceptor::codec::{encode_success_envelope, Value};
use flutter_channel_interceptor::config::BridgeFallback;
use flutter_channel_interceptor::hooks::{monitor_profile, perform, Outcome};
use flutter_channel_interceptor::host::{Reply, SimulatedRuntime};
use flutter_channel_interceptor::InterceptConfig;

struct Streamer(Arc<Mutex<Option<Arc<dyn EventSink>>>>);

impl StreamHandler for Streamer {
    fn on_listen(&mut self, _arguments: Value, events: Arc<dyn EventSink>) {
        *self.0.lock().unwrap() = Some(events);
    }

    fn on_cancel(&mut self, _arguments: Value) {}
}

struct Slot(Arc<Mutex<Option<Value>>>);

impl MethodResult for Slot {
    fn success(self: Box<Self>, value: Value) {
        *self.0.lock().unwrap() = Some(value);
    }

    fn error(self: Box<Self>, code: String, _message: Option<String>, _details: Value) {
        *self.0.lock().unwrap() = Some(Value::String(code));
    }

    fn not_implemented(self: Box<Self>) {}
}

#[derive(Debug, PartialEq)]
struct Transcript {
    replies: Vec<Option<Reply>>,
    received: Vec<OutboundMessage>,
    host_result: Option<Value>,
}

/// Drives the same traffic through a runtime and records what Dart and the
/// host observed.
fn run(rt: &mut SimulatedRuntime) -> Transcript {
    rt.set_method_call_handler(
        "flutter_jailbreak_detection",
        |call: MethodCall, result: Box<dyn MethodResult>| match call.method.as_str() {
            "jailbroken" => result.success(Value::Bool(true)),
            "fail" => result.error("E".to_owned(), Some("no".to_owned()), Value::Int(3)),
            _ => result.not_implemented(),
        },
    );
    let slot = Arc::new(Mutex::new(None));
    rt.set_stream_handler("talsec.app/freerasp/events", Streamer(Arc::clone(&slot)));

    let mut replies = vec![
        rt.call_method("flutter_jailbreak_detection", "jailbroken", Value::Null),
        rt.call_method("flutter_jailbreak_detection", "fail", Value::from("x")),
        rt.call_method("flutter_jailbreak_detection", "nope", Value::Null),
        rt.call_method("unregistered", "x", Value::Null),
        rt.listen("talsec.app/freerasp/events", Value::Null),
    ];

    let events = slot.lock().unwrap().clone().unwrap();
    events.success(Value::Map(vec![(Value::from("threat"), Value::from("root"))]));
    events.error("threat".to_owned(), None, Value::Null);
    events.end_of_stream();
    rt.pump();
    replies.push(rt.cancel("talsec.app/freerasp/events", Value::Null));

    rt.send_message("app/basic", Value::Uint8List(Bytes::from_static(&[1, 2, 3])));

    let host_result = Arc::new(Mutex::new(None));
    rt.invoke_method(
        "app/dart",
        MethodCall::new("ping", Value::Null),
        Some(Box::new(Slot(Arc::clone(&host_result)))),
    );
    let response = rt
        .received_on("app/dart")
        .last()
        .and_then(|m| m.response)
        .unwrap();
    rt.respond_from_dart(response, Some(encode_success_envelope(&Value::from("pong"))));

    let host_result = host_result.lock().unwrap().clone();
    Transcript {
        replies,
        received: rt.dart().received().to_vec(),
        host_result,
    }
}

#[test]
fn monitor_profile_is_observation_only() {
    let baseline = run(&mut SimulatedRuntime::new());

    let mut monitored = SimulatedRuntime::new();
    let config = InterceptConfig::builder()
        .bridge_fallback(BridgeFallback::Always)
        .build()
        .unwrap();
    let report = perform(&mut monitored, monitor_profile(&config));
    assert_eq!(report.installed(), 2);

    assert_eq!(run(&mut monitored), baseline);
    assert!(monitored.errors().is_empty());
}

#[test]
fn bridge_monitor_alone_is_observation_only() {
    let baseline = run(&mut SimulatedRuntime::new());

    let mut monitored = SimulatedRuntime::obfuscated();
    let report = perform(&mut monitored, monitor_profile(&InterceptConfig::default()));
    assert_eq!(report.installed(), 1);
    assert_eq!(report.failed(), 1);

    assert_eq!(run(&mut monitored), baseline);
}

#[test]
fn default_monitor_profile_also_watches_the_bridge() {
    let baseline = run(&mut SimulatedRuntime::new());

    let mut monitored = SimulatedRuntime::new();
    let report = perform(&mut monitored, monitor_profile(&InterceptConfig::default()));
    assert_eq!(report.outcome("channel-monitor"), Some(&Outcome::Installed));
    assert_eq!(report.outcome("bridge-monitor"), Some(&Outcome::Installed));

    assert_eq!(run(&mut monitored), baseline);
    assert!(monitored.errors().is_empty());
}
