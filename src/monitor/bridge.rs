use bytes::Bytes;

use crate::bridge::{BridgeHook, OutboundMessage, PlatformBridge, PlatformMessage, ResponseId};
use crate::config::InterceptConfig;

use super::{inspect_envelope, inspect_payload};

/// [`BridgeHook`] that logs every raw message and forwards it unchanged.
#[derive(Debug, Clone)]
pub struct BridgeMonitor {
    inspect_payloads: bool,
}

impl BridgeMonitor {
    pub fn new(config: &InterceptConfig) -> Self {
        Self {
            inspect_payloads: config.inspect_payloads,
        }
    }

    fn describe(&self, payload: Option<&Bytes>) -> String {
        if self.inspect_payloads {
            inspect_payload(payload.map(|b| &b[..])).to_string()
        } else {
            format!("{} bytes", payload.map_or(0, Bytes::len))
        }
    }
}

impl BridgeHook for BridgeMonitor {
    fn handle_platform_message(&mut self, bridge: &mut dyn PlatformBridge, message: PlatformMessage) {
        tracing::info!(
            channel = message.channel.as_deref().unwrap_or("<null>"),
            reply_id = message.reply.map(|r| r.0),
            payload = %self.describe(message.payload.as_ref()),
            "raw inbound"
        );
        bridge.handle_platform_message(message);
    }

    fn dispatch_platform_message(&mut self, bridge: &mut dyn PlatformBridge, message: OutboundMessage) {
        tracing::info!(
            channel = %message.channel,
            position = message.position(),
            response_id = message.response.map(|r| r.0),
            payload = %self.describe(message.payload.as_ref()),
            "raw outbound"
        );
        bridge.dispatch_platform_message(message);
    }

    fn handle_platform_message_response(
        &mut self,
        bridge: &mut dyn PlatformBridge,
        response: ResponseId,
        payload: Option<Bytes>,
    ) {
        let described = match (&payload, self.inspect_payloads) {
            (Some(bytes), true) if !bytes.is_empty() => inspect_envelope(bytes).to_string(),
            _ => self.describe(payload.as_ref()),
        };
        tracing::info!(response_id = response.0, payload = %described, "raw response");
        bridge.handle_platform_message_response(response, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MessageData, ReplyId};
    use crate::codec::{encode_success_envelope, Value};
    use crate::error::BridgeError;

    #[derive(Default)]
    struct Recording {
        handled: Vec<PlatformMessage>,
        dispatched: Vec<OutboundMessage>,
        responses: Vec<(ResponseId, Option<Bytes>)>,
    }

    impl PlatformBridge for Recording {
        fn handle_platform_message(&mut self, message: PlatformMessage) {
            self.handled.push(message);
        }

        fn dispatch_platform_message(&mut self, message: OutboundMessage) {
            self.dispatched.push(message);
        }

        fn handle_platform_message_response(&mut self, response: ResponseId, payload: Option<Bytes>) {
            self.responses.push((response, payload));
        }

        fn invoke_platform_message_response_callback(
            &mut self,
            _reply: ReplyId,
            _payload: Option<Bytes>,
        ) -> Result<(), BridgeError> {
            Ok(())
        }

        fn cleanup_message_data(&mut self, _handle: MessageData) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    #[test]
    fn every_entry_point_forwards_unchanged() {
        let mut monitor = BridgeMonitor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();
        let inbound = PlatformMessage {
            channel: Some("flutter_jailbreak_detection".to_owned()),
            payload: Some(Bytes::from_static(&[0xFF, 0x00])),
            reply: Some(ReplyId(1)),
            message_data: MessageData(2),
        };
        let outbound = OutboundMessage {
            channel: "talsec.app/freerasp/events".to_owned(),
            payload: None,
            response: None,
        };
        let reply = encode_success_envelope(&Value::Bool(false));

        monitor.handle_platform_message(&mut bridge, inbound.clone());
        monitor.dispatch_platform_message(&mut bridge, outbound.clone());
        monitor.handle_platform_message_response(&mut bridge, ResponseId(3), Some(reply.clone()));

        assert_eq!(bridge.handled, vec![inbound]);
        assert_eq!(bridge.dispatched, vec![outbound]);
        assert_eq!(bridge.responses, vec![(ResponseId(3), Some(reply))]);
    }

    #[test]
    fn describe_respects_inspection_switch() {
        let payload = Bytes::from_static(&[0x00, 0x02]);
        let on = BridgeMonitor::new(&InterceptConfig::default());
        assert_eq!(on.describe(Some(&payload)), "success false");

        let off = BridgeMonitor::new(
            &InterceptConfig::builder().inspect_payloads(false).build().unwrap(),
        );
        assert_eq!(off.describe(Some(&payload)), "2 bytes");
    }
}
