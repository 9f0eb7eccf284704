use bytes::Bytes;

use crate::classify::ChannelCategory;
use crate::codec::{encode_success_envelope, Value};
use crate::config::InterceptConfig;

/// A fabricated benign reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Forgery {
    value: Value,
}

impl Forgery {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Value handed to a result callback.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Success envelope bytes for the raw reply path.
    pub fn envelope(&self) -> Bytes {
        encode_success_envelope(&self.value)
    }
}

/// What to do with one call or event.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Let the original handler run untouched.
    Passthrough,
    /// Swallow the event; nothing is delivered.
    Drop,
    /// Answer with a fabricated reply and skip the original handler.
    Forge(Forgery),
}

/// Decides, per detection category and method, which reply to fabricate.
#[derive(Debug, Clone)]
pub struct ResponseForger {
    jailbreak_methods: Vec<String>,
    pinning_methods: Vec<String>,
    pinning_token: String,
}

impl ResponseForger {
    pub fn new(config: &InterceptConfig) -> Self {
        Self {
            jailbreak_methods: config.jailbreak_methods.clone(),
            pinning_methods: config.pinning_methods.clone(),
            pinning_token: config.pinning_token.clone(),
        }
    }

    /// `method` is `None` on the raw bridge path, where calls are not
    /// decoded and every message on an intercepted channel is answered.
    pub fn verdict(&self, category: ChannelCategory, method: Option<&str>) -> Verdict {
        match category {
            ChannelCategory::ThreatTelemetryStream => Verdict::Drop,
            ChannelCategory::JailbreakMethodChannel
                if matches_method(&self.jailbreak_methods, method) =>
            {
                Verdict::Forge(self.not_detected())
            }
            ChannelCategory::CertificatePinningMethodChannel
                if matches_method(&self.pinning_methods, method) =>
            {
                Verdict::Forge(self.connection_secure())
            }
            _ => Verdict::Passthrough,
        }
    }

    /// Boolean `false`: "not jailbroken", "cannot mock location", ...
    pub fn not_detected(&self) -> Forgery {
        Forgery::new(Value::Bool(false))
    }

    pub fn connection_secure(&self) -> Forgery {
        Forgery::new(Value::String(self.pinning_token.clone()))
    }
}

impl Default for ResponseForger {
    fn default() -> Self {
        Self::new(&InterceptConfig::default())
    }
}

fn matches_method(methods: &[String], method: Option<&str>) -> bool {
    match method {
        Some(method) => methods.iter().any(|m| m == method),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jailbreak_methods_forge_false() {
        let forger = ResponseForger::default();
        for method in ["jailbroken", "canMockLocation", "developerMode"] {
            let verdict = forger.verdict(ChannelCategory::JailbreakMethodChannel, Some(method));
            assert_eq!(verdict, Verdict::Forge(Forgery::new(Value::Bool(false))));
        }
    }

    #[test]
    fn other_jailbreak_methods_pass_through() {
        let forger = ResponseForger::default();
        assert_eq!(
            forger.verdict(ChannelCategory::JailbreakMethodChannel, Some("getPlatformVersion")),
            Verdict::Passthrough
        );
    }

    #[test]
    fn pinning_check_forges_token_bytes() {
        let forger = ResponseForger::default();
        let Verdict::Forge(forgery) =
            forger.verdict(ChannelCategory::CertificatePinningMethodChannel, Some("check"))
        else {
            panic!("expected forgery");
        };
        let mut expected = vec![0x00, 0x07, 17];
        expected.extend_from_slice(b"CONNECTION_SECURE");
        assert_eq!(&forgery.envelope()[..], &expected[..]);
    }

    #[test]
    fn telemetry_is_dropped_and_other_passes() {
        let forger = ResponseForger::default();
        assert_eq!(
            forger.verdict(ChannelCategory::ThreatTelemetryStream, None),
            Verdict::Drop
        );
        assert_eq!(
            forger.verdict(ChannelCategory::Other, Some("jailbroken")),
            Verdict::Passthrough
        );
    }

    #[test]
    fn raw_path_forges_any_call_on_intercepted_channel() {
        let forger = ResponseForger::default();
        assert_eq!(
            forger.verdict(ChannelCategory::JailbreakMethodChannel, None),
            Verdict::Forge(forger.not_detected())
        );
        assert_eq!(
            forger.verdict(ChannelCategory::CertificatePinningMethodChannel, None),
            Verdict::Forge(forger.connection_secure())
        );
    }
}
