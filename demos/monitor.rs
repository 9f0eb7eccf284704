//! Channel traffic monitor on the simulated host.
//!
//! Installs the monitor profile and plays a short session in both
//! directions. Every call, result, event and raw message is logged; nothing
//! is changed.
//!
//! Usage:
//!   RUST_LOG=info cargo run --example monitor
//!   cargo run --example monitor -- --bridge always --no-inspect

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use flutter_channel_interceptor::channel::{EventSink, MethodCall, MethodResult, StreamHandler};
use flutter_channel_interceptor::codec::encode_success_envelope;
use flutter_channel_interceptor::hooks::{monitor_profile, perform};
use flutter_channel_interceptor::host::SimulatedRuntime;
use flutter_channel_interceptor::{BridgeFallback, InterceptConfig, Value};

#[derive(Clone, Copy, ValueEnum)]
enum Bridge {
    OnFailure,
    Always,
    Never,
}

impl From<Bridge> for BridgeFallback {
    fn from(b: Bridge) -> Self {
        match b {
            Bridge::OnFailure => BridgeFallback::OnFailure,
            Bridge::Always => BridgeFallback::Always,
            Bridge::Never => BridgeFallback::Never,
        }
    }
}

#[derive(Parser)]
#[command(name = "monitor")]
#[command(about = "Log platform-channel traffic on a simulated host")]
struct Cli {
    /// When to hook the raw bridge as well.
    #[arg(long, value_enum, default_value_t = Bridge::OnFailure)]
    bridge: Bridge,

    /// Log raw payload sizes instead of decoding them.
    #[arg(long)]
    no_inspect: bool,

    /// Hide the channel registration API.
    #[arg(long)]
    obfuscated: bool,
}

struct Ticker(Arc<Mutex<Option<Arc<dyn EventSink>>>>);

impl StreamHandler for Ticker {
    fn on_listen(&mut self, _arguments: Value, events: Arc<dyn EventSink>) {
        events.success(Value::Int32List(vec![1, 2, 3]));
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(events);
        }
    }

    fn on_cancel(&mut self, _arguments: Value) {}
}

struct PrintResult;

impl MethodResult for PrintResult {
    fn success(self: Box<Self>, value: Value) {
        println!("host received {value:?}");
    }

    fn error(self: Box<Self>, code: String, message: Option<String>, _details: Value) {
        println!("host received error {code}: {}", message.unwrap_or_default());
    }

    fn not_implemented(self: Box<Self>) {
        println!("host received not-implemented");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = InterceptConfig::builder()
        .bridge_fallback(cli.bridge.into())
        .inspect_payloads(!cli.no_inspect)
        .build()?;

    let mut rt = if cli.obfuscated {
        SimulatedRuntime::obfuscated()
    } else {
        SimulatedRuntime::new()
    };
    let report = perform(&mut rt, monitor_profile(&config));
    anyhow::ensure!(report.any_installed(), "no hook could be installed");

    rt.set_method_call_handler(
        "plugins.flutter.io/device_info",
        |call: MethodCall, result: Box<dyn MethodResult>| match call.method.as_str() {
            "getAndroidDeviceInfo" => result.success(Value::Map(vec![
                (Value::from("model"), Value::from("Pixel 8")),
                (Value::from("sdkInt"), Value::Int(34)),
                (Value::from("isPhysicalDevice"), Value::Bool(true)),
            ])),
            _ => result.not_implemented(),
        },
    );
    let slot = Arc::new(Mutex::new(None));
    rt.set_stream_handler("app/ticker", Ticker(Arc::clone(&slot)));

    rt.call_method("plugins.flutter.io/device_info", "getAndroidDeviceInfo", Value::Null);
    rt.call_method("plugins.flutter.io/device_info", "getIosInfo", Value::Null);
    rt.send_raw(Some("app/raw"), Some(Bytes::from_static(&[0xFF, 0x00, 0x2A])), true);

    rt.listen("app/ticker", Value::from("fast"));
    if let Some(events) = slot.lock().ok().and_then(|s| s.clone()) {
        events.success(Value::Double(f64::NAN));
        events.end_of_stream();
    }
    rt.pump();
    rt.cancel("app/ticker", Value::Null);

    rt.send_message("app/basic", Value::from("hello dart"));
    rt.invoke_method(
        "app/dart",
        MethodCall::new("getRoute", Value::Null),
        Some(Box::new(PrintResult)),
    );
    let pending: Vec<_> = rt
        .received_on("app/dart")
        .filter_map(|m| m.response)
        .collect();
    for response in pending {
        rt.respond_from_dart(response, Some(encode_success_envelope(&Value::from("/home"))));
    }

    anyhow::ensure!(rt.errors().is_empty(), "bridge errors: {:?}", rt.errors());
    Ok(())
}
