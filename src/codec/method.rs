use bytes::{Bytes, BytesMut};

use super::{write_value, Value, ValueReader};
use crate::error::CodecError;

/// A decoded method invocation: name plus arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    pub fn encode(&self) -> Bytes {
        encode_method_call(self)
    }
}

/// Method name as a string value, then the arguments value.
///
/// Panics if a length inside the call exceeds [`MAX_SIZE`](super::MAX_SIZE).
pub fn encode_method_call(call: &MethodCall) -> Bytes {
    let mut buf = BytesMut::new();
    write_value(&mut buf, &Value::String(call.method.clone()));
    write_value(&mut buf, &call.arguments);
    buf.freeze()
}

pub fn decode_method_call(bytes: &[u8]) -> Result<MethodCall, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let mut reader = ValueReader::new(bytes);
    let method = match reader.read_value()? {
        Value::String(method) => method,
        _ => return Err(CodecError::MethodNameNotString),
    };
    let arguments = reader.read_value()?;
    reader.finish()?;
    Ok(MethodCall { method, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jailbroken_call_layout() {
        let call = MethodCall::new("jailbroken", Value::Null);
        let mut expected = vec![0x07, 10];
        expected.extend_from_slice(b"jailbroken");
        expected.push(0x00);
        assert_eq!(&call.encode()[..], &expected[..]);
        assert_eq!(decode_method_call(&expected).unwrap(), call);
    }

    #[test]
    fn arguments_roundtrip() {
        let call = MethodCall::new(
            "check",
            Value::Map(vec![
                (Value::from("url"), Value::from("https://example.org")),
                (
                    Value::from("fingerprints"),
                    Value::List(vec![Value::from("AA:BB"), Value::from("CC:DD")]),
                ),
                (Value::from("timeout"), Value::Int(60)),
            ]),
        );
        assert_eq!(decode_method_call(&call.encode()).unwrap(), call);
    }

    #[test]
    fn method_name_must_be_string() {
        assert_eq!(
            decode_method_call(&[0x01, 0x00]).unwrap_err(),
            CodecError::MethodNameNotString
        );
    }

    #[test]
    fn missing_arguments_is_truncation() {
        let err = decode_method_call(&[0x07, 0x01, b'x']).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { offset: 3, .. }));
    }

    #[test]
    fn empty_call() {
        assert_eq!(decode_method_call(&[]).unwrap_err(), CodecError::EmptyPayload);
    }
}
