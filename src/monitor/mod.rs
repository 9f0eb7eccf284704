//! Observation-only variant of the engine.
//!
//! The proxies here log every call, result, event and raw message in both
//! directions and then forward it unchanged. Rendering never fails: values
//! JSON cannot carry degrade to strings and undecodable payloads to a hex
//! preview.

pub mod bridge;
pub mod channel;

use std::fmt;

use serde_json::json;

use crate::codec::{decode_envelope, decode_method_call, decode_value, Envelope, MethodCall, Value};
use crate::error::CodecError;

pub use bridge::BridgeMonitor;
pub use channel::{
    ChannelMonitor, MonitoringEventSink, MonitoringMethodHandler, MonitoringResult,
    MonitoringStreamHandler,
};

/// Bytes shown in the hex preview of an undecodable payload.
const PREVIEW_BYTES: usize = 64;

/// Converts a codec value into JSON for logging.
///
/// Typed arrays and big integers become `{"type": <name>, "value": <text>}`.
/// Map keys are rendered to strings; a later duplicate key replaces an
/// earlier one.
pub fn serialize_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Long(l) => json!(l),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
        Value::String(s) => json!(s),
        Value::BigInt(hex) => typed(value, hex.clone()),
        Value::Uint8List(bytes) => typed(value, hex::encode(bytes)),
        Value::Int32List(v) => typed(value, format!("{v:?}")),
        Value::Int64List(v) => typed(value, format!("{v:?}")),
        Value::Float32List(v) => typed(value, format!("{v:?}")),
        Value::Float64List(v) => typed(value, format!("{v:?}")),
        Value::List(items) => serde_json::Value::Array(items.iter().map(serialize_value).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (display_string(k), serialize_value(v)))
                .collect(),
        ),
    }
}

fn typed(value: &Value, text: String) -> serde_json::Value {
    json!({ "type": value.type_name(), "value": text })
}

/// Compact JSON text of a value.
pub fn render_value(value: &Value) -> String {
    serialize_value(value).to_string()
}

/// Strings as-is, anything else as compact JSON.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => render_value(other),
    }
}

/// Result of a best-effort decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection<T> {
    Decoded(T),
    /// Why decoding failed, with a hex preview of the bytes.
    Fallback(String),
}

impl<T> Inspection<T> {
    pub fn is_decoded(&self) -> bool {
        matches!(self, Inspection::Decoded(_))
    }

    fn fallback(bytes: &[u8], err: &CodecError) -> Self {
        let shown = bytes.len().min(PREVIEW_BYTES);
        let ellipsis = if bytes.len() > shown { "..." } else { "" };
        Inspection::Fallback(format!(
            "<undecodable: {err}; {} bytes: {}{ellipsis}>",
            bytes.len(),
            hex::encode(&bytes[..shown])
        ))
    }
}

impl<T: fmt::Display> fmt::Display for Inspection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inspection::Decoded(t) => fmt::Display::fmt(t, f),
            Inspection::Fallback(text) => f.write_str(text),
        }
    }
}

/// A raw payload as best understood.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Call(MethodCall),
    Envelope(Envelope),
    Value(Value),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("<empty>"),
            Payload::Call(call) => write!(f, "{}({})", call.method, render_value(&call.arguments)),
            Payload::Envelope(envelope) => fmt::Display::fmt(envelope, f),
            Payload::Value(value) => f.write_str(&render_value(value)),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Success(value) => write!(f, "success {}", render_value(value)),
            Envelope::Error {
                code,
                message,
                details,
                ..
            } => write!(
                f,
                "error {code}: {} {}",
                message.as_deref().unwrap_or(""),
                render_value(details)
            ),
        }
    }
}

/// Decodes an unknown raw payload, trying a method call, then an envelope,
/// then a bare value.
pub fn inspect_payload(bytes: Option<&[u8]>) -> Inspection<Payload> {
    let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
        return Inspection::Decoded(Payload::Empty);
    };
    if let Ok(call) = decode_method_call(bytes) {
        return Inspection::Decoded(Payload::Call(call));
    }
    if let Ok(envelope) = decode_envelope(bytes) {
        return Inspection::Decoded(Payload::Envelope(envelope));
    }
    match decode_value(bytes) {
        Ok(value) => Inspection::Decoded(Payload::Value(value)),
        Err(e) => Inspection::fallback(bytes, &e),
    }
}

/// Decodes a reply known to be a method-codec envelope.
pub fn inspect_envelope(bytes: &[u8]) -> Inspection<Envelope> {
    match decode_envelope(bytes) {
        Ok(envelope) => Inspection::Decoded(envelope),
        Err(e) => Inspection::fallback(bytes, &e),
    }
}
