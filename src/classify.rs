//! Channel-name classification.
//!
//! A misclassified channel silently breaks the app, so classification is a
//! pure function of the name: no state, no side effects, same answer for
//! the same input.

use std::fmt;

use crate::config::InterceptConfig;

/// Logical category of a platform channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelCategory {
    /// Event stream carrying threat notifications (RASP telemetry).
    ThreatTelemetryStream,
    /// Method channel answering root/jailbreak checks.
    JailbreakMethodChannel,
    /// Method channel answering certificate-pinning checks.
    CertificatePinningMethodChannel,
    /// Anything else: always passed through.
    Other,
}

impl ChannelCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThreatTelemetryStream => "threat-telemetry",
            Self::JailbreakMethodChannel => "jailbreak",
            Self::CertificatePinningMethodChannel => "certificate-pinning",
            Self::Other => "other",
        }
    }

    pub const fn is_intercepted(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for ChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword matcher over lower-cased channel names.
#[derive(Debug, Clone)]
pub struct ChannelClassifier {
    rules: [(ChannelCategory, Vec<String>); 3],
}

impl ChannelClassifier {
    pub fn new(config: &InterceptConfig) -> Self {
        let lower = |keywords: &[String]| -> Vec<String> {
            keywords.iter().map(|k| k.to_lowercase()).collect()
        };
        Self {
            rules: [
                (
                    ChannelCategory::ThreatTelemetryStream,
                    lower(&config.telemetry_keywords),
                ),
                (
                    ChannelCategory::JailbreakMethodChannel,
                    lower(&config.jailbreak_keywords),
                ),
                (
                    ChannelCategory::CertificatePinningMethodChannel,
                    lower(&config.pinning_keywords),
                ),
            ],
        }
    }

    /// First category with a keyword contained in the name; `Other` when
    /// nothing matches or the name is absent.
    pub fn classify(&self, channel: Option<&str>) -> ChannelCategory {
        let Some(channel) = channel else {
            return ChannelCategory::Other;
        };
        let name = channel.to_lowercase();
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k.as_str())))
            .map_or(ChannelCategory::Other, |(category, _)| *category)
    }
}

impl Default for ChannelClassifier {
    fn default() -> Self {
        Self::new(&InterceptConfig::default())
    }
}
