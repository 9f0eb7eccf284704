use crate::bridge::ReplyId;

/// Errors from decoding standard-codec payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("truncated payload: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown value type code: 0x{0:02X}")]
    UnknownTypeCode(u8),

    #[error("unknown envelope tag: 0x{0:02X}")]
    UnknownEnvelope(u8),

    #[error("declared element count {count} exceeds {remaining} remaining bytes")]
    SizeExceedsBuffer { count: usize, remaining: usize },

    #[error("value nesting exceeds {max} levels")]
    NestingTooDeep { max: usize },

    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("method name is not a string")]
    MethodNameNotString,

    #[error("error envelope has a non-string {0}")]
    InvalidErrorEnvelope(&'static str),

    #[error("empty payload")]
    EmptyPayload,
}

/// Errors from installing a hook into the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("{surface} is not reachable in this runtime")]
    SurfaceUnavailable { surface: &'static str },

    #[error("{surface} is already hooked")]
    AlreadyHooked { surface: &'static str },
}

/// Errors reported by the Dart side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("reply {0} already answered")]
    DuplicateReply(ReplyId),

    #[error("reply {0} is not pending")]
    UnknownReply(ReplyId),

    #[error("message data handle {0:#x} is not live")]
    UnknownMessageData(u64),
}

/// Errors from validating an [`InterceptConfig`](crate::config::InterceptConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no keywords configured for {0}")]
    EmptyKeywords(&'static str),

    #[error("blank keyword configured for {0}")]
    BlankKeyword(&'static str),

    #[error("pinning token must not be empty")]
    EmptyToken,
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] CodecError),

    #[error("hook installation failed: {0}")]
    HookInstallation(#[from] HookError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_surfaces_as_malformed_payload() {
        let err: Error = CodecError::UnknownTypeCode(0x2A).into();
        assert_eq!(err.to_string(), "malformed payload: unknown value type code: 0x2A");
    }

    #[test]
    fn hook_error_names_the_surface() {
        let err: Error = HookError::SurfaceUnavailable {
            surface: "MethodChannel.setMethodCallHandler",
        }
        .into();
        assert!(err.to_string().contains("MethodChannel.setMethodCallHandler"));
    }
}
