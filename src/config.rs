use serde::Deserialize;

use crate::error::{ConfigError, Error};

/// Reply the certificate-pinning plugin sends when a check passes.
pub const DEFAULT_PINNING_TOKEN: &str = "CONNECTION_SECURE";

/// When the bypass profile installs the raw-bridge hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeFallback {
    /// Only if the registration hook could not be installed.
    #[default]
    OnFailure,
    Always,
    Never,
}

/// Channel keywords, intercepted method names and forged values.
///
/// The defaults describe the observed target: Talsec/freeRASP threat
/// telemetry, the `flutter_jailbreak_detection` plugin and the
/// `http_certificate_pinning` plugin.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Substrings identifying threat-telemetry event channels.
    pub telemetry_keywords: Vec<String>,

    /// Substrings identifying jailbreak/root detection channels.
    pub jailbreak_keywords: Vec<String>,

    /// Substrings identifying certificate-pinning channels.
    pub pinning_keywords: Vec<String>,

    /// Methods on jailbreak channels answered with `false`.
    pub jailbreak_methods: Vec<String>,

    /// Methods on pinning channels answered with `pinning_token`.
    pub pinning_methods: Vec<String>,

    /// String forged for pinning checks.
    pub pinning_token: String,

    /// Raw-bridge hook policy. The monitor profile treats `OnFailure` as
    /// `Always`.
    pub bridge_fallback: BridgeFallback,

    /// Decode raw payloads in monitor logs (default: true).
    pub inspect_payloads: bool,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            telemetry_keywords: strings(&["talsec", "freerasp"]),
            jailbreak_keywords: strings(&["flutter_jailbreak_detection"]),
            pinning_keywords: strings(&["http_certificate_pinning"]),
            jailbreak_methods: strings(&["jailbroken", "canMockLocation", "developerMode"]),
            pinning_methods: strings(&["check"]),
            pinning_token: DEFAULT_PINNING_TOKEN.to_owned(),
            bridge_fallback: BridgeFallback::default(),
            inspect_payloads: true,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl InterceptConfig {
    /// Create a builder for constructing an `InterceptConfig`.
    pub fn builder() -> InterceptConfigBuilder {
        InterceptConfigBuilder::default()
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: InterceptConfig = serde_json::from_str(json)?;
        Ok(config.validated()?)
    }

    /// Check keyword sets and lower-case them for matching.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        for (name, keywords) in [
            ("telemetry", &mut self.telemetry_keywords),
            ("jailbreak", &mut self.jailbreak_keywords),
            ("pinning", &mut self.pinning_keywords),
        ] {
            if keywords.is_empty() {
                return Err(ConfigError::EmptyKeywords(name));
            }
            for keyword in keywords.iter_mut() {
                if keyword.trim().is_empty() {
                    return Err(ConfigError::BlankKeyword(name));
                }
                *keyword = keyword.to_lowercase();
            }
        }
        if self.pinning_token.is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        Ok(self)
    }
}

/// Builder for [`InterceptConfig`].
#[derive(Debug, Clone, Default)]
pub struct InterceptConfigBuilder {
    config: InterceptConfig,
}

impl InterceptConfigBuilder {
    pub fn telemetry_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.telemetry_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn jailbreak_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.jailbreak_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn pinning_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.pinning_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn jailbreak_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.jailbreak_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn pinning_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.pinning_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn pinning_token(mut self, token: impl Into<String>) -> Self {
        self.config.pinning_token = token.into();
        self
    }

    pub fn bridge_fallback(mut self, fallback: BridgeFallback) -> Self {
        self.config.bridge_fallback = fallback;
        self
    }

    pub fn inspect_payloads(mut self, inspect: bool) -> Self {
        self.config.inspect_payloads = inspect;
        self
    }

    /// Build the `InterceptConfig`, validating that all values are sensible.
    pub fn build(self) -> Result<InterceptConfig, ConfigError> {
        self.config.validated()
    }
}
