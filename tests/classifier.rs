use proptest::prelude::*;

use flutter_channel_interceptor::classify::{ChannelCategory, ChannelClassifier};
use flutter_channel_interceptor::config::InterceptConfig;

#[test]
fn observed_channels_classify() {
    let classifier = ChannelClassifier::default();

    assert_eq!(classifier.classify(Some("TALSEC_EVENTS")), ChannelCategory::ThreatTelemetryStream);
    assert_eq!(classifier.classify(Some("talsec_events")), ChannelCategory::ThreatTelemetryStream);
    assert_eq!(
        classifier.classify(Some("flutter_jailbreak_detection")),
        ChannelCategory::JailbreakMethodChannel
    );
    assert_eq!(
        classifier.classify(Some("http_certificate_pinning")),
        ChannelCategory::CertificatePinningMethodChannel
    );
    assert_eq!(classifier.classify(Some("some_random_channel")), ChannelCategory::Other);
    assert_eq!(classifier.classify(None), ChannelCategory::Other);
}

#[test]
fn custom_keywords_replace_defaults() {
    let config = InterceptConfig::builder()
        .telemetry_keywords(["ShieldSDK"])
        .build()
        .unwrap();
    let classifier = ChannelClassifier::new(&config);

    assert_eq!(
        classifier.classify(Some("com.vendor/shieldsdk/events")),
        ChannelCategory::ThreatTelemetryStream
    );
    assert_eq!(classifier.classify(Some("talsec")), ChannelCategory::Other);
}

proptest! {
    #[test]
    fn classification_is_deterministic(name in ".{0,64}") {
        let classifier = ChannelClassifier::default();
        prop_assert_eq!(classifier.classify(Some(&name)), classifier.classify(Some(&name)));
    }

    #[test]
    fn classification_ignores_ascii_case(name in "[a-zA-Z_./]{0,48}") {
        let classifier = ChannelClassifier::default();
        prop_assert_eq!(
            classifier.classify(Some(&name.to_ascii_uppercase())),
            classifier.classify(Some(&name.to_ascii_lowercase()))
        );
    }

    #[test]
    fn keyword_anywhere_in_name_matches(prefix in "[a-z/.]{0,16}", suffix in "[a-z/.]{0,16}") {
        let classifier = ChannelClassifier::default();
        let name = format!("{prefix}FreeRASP{suffix}");
        prop_assert_eq!(classifier.classify(Some(&name)), ChannelCategory::ThreatTelemetryStream);
    }
}
