use bytes::{BufMut, Bytes, BytesMut};

use super::{write_value, Value, ValueReader};
use crate::error::CodecError;

/// Leading byte of a success envelope.
pub const SUCCESS_TAG: u8 = 0x00;

/// Leading byte of an error envelope.
pub const ERROR_TAG: u8 = 0x01;

/// A method-call response as it travels back over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(Value),
    Error {
        code: String,
        message: Option<String>,
        details: Value,
        stacktrace: Option<String>,
    },
}

impl Envelope {
    pub fn error(code: impl Into<String>, message: Option<String>, details: Value) -> Self {
        Envelope::Error {
            code: code.into(),
            message,
            details,
            stacktrace: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Envelope::Success(value) => encode_success_envelope(value),
            Envelope::Error {
                code,
                message,
                details,
                stacktrace: None,
            } => encode_error_envelope(code, message.as_deref(), details),
            Envelope::Error {
                code,
                message,
                details,
                stacktrace,
            } => encode_error_envelope_with_stacktrace(
                code,
                message.as_deref(),
                details,
                stacktrace.as_deref(),
            ),
        }
    }
}

/// `[0x00][type code][payload]`.
///
/// Panics if a length inside `value` exceeds [`MAX_SIZE`](super::MAX_SIZE).
pub fn encode_success_envelope(value: &Value) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(SUCCESS_TAG);
    write_value(&mut buf, value);
    buf.freeze()
}

/// `[0x01]` followed by code, message and details values. Same length limit
/// as [`encode_success_envelope`].
pub fn encode_error_envelope(code: &str, message: Option<&str>, details: &Value) -> Bytes {
    let mut buf = BytesMut::new();
    write_error_fields(&mut buf, code, message, details);
    buf.freeze()
}

/// Error envelope with a fourth stacktrace value, as newer engines send.
pub fn encode_error_envelope_with_stacktrace(
    code: &str,
    message: Option<&str>,
    details: &Value,
    stacktrace: Option<&str>,
) -> Bytes {
    let mut buf = BytesMut::new();
    write_error_fields(&mut buf, code, message, details);
    write_value(&mut buf, &Value::from(stacktrace));
    buf.freeze()
}

fn write_error_fields(buf: &mut BytesMut, code: &str, message: Option<&str>, details: &Value) {
    buf.put_u8(ERROR_TAG);
    write_value(buf, &Value::from(code));
    write_value(buf, &Value::from(message));
    write_value(buf, details);
}

/// Decode a success or error envelope, rejecting trailing bytes.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let mut reader = ValueReader::new(bytes);
    if !reader.has_remaining() {
        return Err(CodecError::EmptyPayload);
    }
    let envelope = match reader.read_u8()? {
        SUCCESS_TAG => Envelope::Success(reader.read_value()?),
        ERROR_TAG => {
            let code = match reader.read_value()? {
                Value::String(code) => code,
                _ => return Err(CodecError::InvalidErrorEnvelope("code")),
            };
            let message = optional_string(reader.read_value()?, "message")?;
            let details = reader.read_value()?;
            let stacktrace = if reader.has_remaining() {
                optional_string(reader.read_value()?, "stacktrace")?
            } else {
                None
            };
            Envelope::Error {
                code,
                message,
                details,
                stacktrace,
            }
        }
        other => return Err(CodecError::UnknownEnvelope(other)),
    };
    reader.finish()?;
    Ok(envelope)
}

fn optional_string(value: Value, field: &'static str) -> Result<Option<String>, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        _ => Err(CodecError::InvalidErrorEnvelope(field)),
    }
}
