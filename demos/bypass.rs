//! Detection bypass on the simulated host.
//!
//! Registers fake jailbreak, pinning and RASP plugins, installs the bypass
//! profile, then plays the Dart side against them and prints what Dart sees.
//!
//! Usage:
//!   cargo run --example bypass
//!   cargo run --example bypass -- --obfuscated
//!   cargo run --example bypass -- --config bypass.json

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flutter_channel_interceptor::channel::{EventSink, MethodCall, MethodResult, StreamHandler};
use flutter_channel_interceptor::hooks::{bypass_profile, perform};
use flutter_channel_interceptor::host::{Reply, SimulatedRuntime};
use flutter_channel_interceptor::monitor::{inspect_envelope, inspect_payload};
use flutter_channel_interceptor::{InterceptConfig, Value};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "bypass")]
#[command(about = "Forge detection replies and block RASP telemetry on a simulated host")]
struct Cli {
    /// JSON file overriding the default keywords, methods and token.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Hide the channel registration API so only the raw bridge can be hooked.
    #[arg(long)]
    obfuscated: bool,
}

// ---------------------------------------------------------------------------
// Fake plugins: every check reports a compromised device
// ---------------------------------------------------------------------------

const JAILBREAK: &str = "flutter_jailbreak_detection";
const PINNING: &str = "http_certificate_pinning";
const RASP: &str = "talsec.app/freerasp/events";

fn jailbreak_plugin(call: MethodCall, result: Box<dyn MethodResult>) {
    match call.method.as_str() {
        "jailbroken" | "canMockLocation" | "developerMode" => result.success(Value::Bool(true)),
        _ => result.not_implemented(),
    }
}

fn pinning_plugin(call: MethodCall, result: Box<dyn MethodResult>) {
    match call.method.as_str() {
        "check" => result.success(Value::from("CONNECTION_NOT_SECURE")),
        _ => result.not_implemented(),
    }
}

#[derive(Default)]
struct RaspPlugin {
    sink: Arc<Mutex<Option<Arc<dyn EventSink>>>>,
}

impl StreamHandler for RaspPlugin {
    fn on_listen(&mut self, _arguments: Value, events: Arc<dyn EventSink>) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = Some(events);
        }
    }

    fn on_cancel(&mut self, _arguments: Value) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = None;
        }
    }
}

fn show(label: &str, reply: Option<Reply>) {
    match reply {
        Some(reply) if reply.is_empty() => println!("{label:<40} -> <empty>"),
        Some(reply) => println!(
            "{label:<40} -> {}",
            inspect_envelope(reply.payload().unwrap_or_default())
        ),
        None => println!("{label:<40} -> <no reply>"),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<InterceptConfig> {
    let Some(path) = path else {
        return Ok(InterceptConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    InterceptConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let mut rt = if cli.obfuscated {
        SimulatedRuntime::obfuscated()
    } else {
        SimulatedRuntime::new()
    };

    // Hooks go in before the app registers its plugins.
    let report = perform(&mut rt, bypass_profile(&config));
    anyhow::ensure!(report.any_installed(), "no hook could be installed");

    rt.set_method_call_handler(JAILBREAK, jailbreak_plugin);
    rt.set_method_call_handler(PINNING, pinning_plugin);
    let rasp = RaspPlugin::default();
    let rasp_sink = Arc::clone(&rasp.sink);
    rt.set_stream_handler(RASP, rasp);

    println!("--- Dart side ---");
    for method in ["jailbroken", "canMockLocation", "developerMode"] {
        show(&format!("{JAILBREAK}.{method}"), rt.call_method(JAILBREAK, method, Value::Null));
    }
    let url = Value::Map(vec![(Value::from("url"), Value::from("https://api.example.com"))]);
    show(&format!("{PINNING}.check"), rt.call_method(PINNING, "check", url));
    show(&format!("{RASP}.listen"), rt.listen(RASP, Value::Null));

    let events = rasp_sink
        .lock()
        .ok()
        .and_then(|slot| slot.clone())
        .context("RASP plugin was never listened to")?;
    for threat in ["privilegedAccess", "hooks", "appIntegrity"] {
        events.success(Value::from(threat));
    }
    events.end_of_stream();
    rt.pump();

    for message in rt.received_on(RASP) {
        println!(
            "{:<40} -> {}",
            format!("{RASP} event"),
            inspect_payload(message.payload.as_deref())
        );
    }
    show(&format!("{RASP}.cancel"), rt.cancel(RASP, Value::Null));

    anyhow::ensure!(rt.errors().is_empty(), "bridge errors: {:?}", rt.errors());
    Ok(())
}
