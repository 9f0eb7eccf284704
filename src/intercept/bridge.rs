use crate::bridge::{
    BridgeHook, MessageData, OutboundMessage, PlatformBridge, PlatformMessage, ResponseId,
};
use crate::config::InterceptConfig;
use crate::forge::Verdict;

use super::Interceptor;

/// Raw-bridge fallback.
///
/// Decides per channel name, without decoding payloads:
///
/// * inbound messages on jailbreak and pinning channels are answered with
///   forged envelope bytes and never reach the host's handler chain;
/// * outbound non-empty messages on telemetry channels are dropped;
/// * everything else is forwarded unchanged.
#[derive(Debug, Clone)]
pub struct BridgeInterceptor {
    interceptor: Interceptor,
}

impl BridgeInterceptor {
    pub fn new(config: &InterceptConfig) -> Self {
        Self {
            interceptor: Interceptor::new(config),
        }
    }

    fn cleanup(bridge: &mut dyn PlatformBridge, handle: MessageData) {
        if !handle.is_some() {
            return;
        }
        if let Err(e) = bridge.cleanup_message_data(handle) {
            tracing::warn!(handle = handle.0, error = %e, "message data cleanup failed");
        }
    }
}

impl BridgeHook for BridgeInterceptor {
    fn handle_platform_message(&mut self, bridge: &mut dyn PlatformBridge, message: PlatformMessage) {
        let channel = message.channel.as_deref();
        let category = self.interceptor.classify(channel);
        let Verdict::Forge(forgery) = self.interceptor.forger().verdict(category, None) else {
            bridge.handle_platform_message(message);
            return;
        };

        let channel = channel.unwrap_or("<null>");
        match message.reply {
            Some(reply) => {
                tracing::info!(channel, reply_id = reply.0, "[OVERRIDE] raw reply forged");
                if let Err(e) =
                    bridge.invoke_platform_message_response_callback(reply, Some(forgery.envelope()))
                {
                    tracing::warn!(channel, reply_id = reply.0, error = %e, "forged reply rejected");
                }
            }
            None => {
                tracing::info!(channel, "[OVERRIDE] message without reply id dropped");
            }
        }
        Self::cleanup(bridge, message.message_data);
    }

    fn dispatch_platform_message(&mut self, bridge: &mut dyn PlatformBridge, message: OutboundMessage) {
        let category = self.interceptor.classify(Some(&message.channel));
        let verdict = self.interceptor.forger().verdict(category, None);
        if verdict != Verdict::Drop || message.payload.is_none() {
            bridge.dispatch_platform_message(message);
            return;
        }

        tracing::info!(
            channel = %message.channel,
            bytes = message.position(),
            "[BLOCKED] outbound telemetry message"
        );
        if let Some(response) = message.response {
            complete_dropped(bridge, &message.channel, response);
        }
    }
}

fn complete_dropped(bridge: &mut dyn PlatformBridge, channel: &str, response: ResponseId) {
    tracing::warn!(channel, response_id = response.0, "completing dropped message with empty response");
    bridge.handle_platform_message_response(response, None);
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::bridge::ReplyId;
    use crate::codec::{decode_envelope, Envelope, Value};
    use crate::error::BridgeError;

    #[derive(Default)]
    struct Recording {
        handled: Vec<PlatformMessage>,
        dispatched: Vec<OutboundMessage>,
        responses: Vec<(ResponseId, Option<Bytes>)>,
        replies: Vec<(ReplyId, Option<Bytes>)>,
        cleaned: Vec<MessageData>,
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
            reply: ReplyId,
            payload: Option<Bytes>,
        ) -> Result<(), BridgeError> {
            self.replies.push((reply, payload));
            Ok(())
        }

        fn cleanup_message_data(&mut self, handle: MessageData) -> Result<(), BridgeError> {
            self.cleaned.push(handle);
            Ok(())
        }
    }

    fn inbound(channel: &str, reply: Option<i32>, data: u64) -> PlatformMessage {
        PlatformMessage {
            channel: Some(channel.to_owned()),
            payload: Some(crate::codec::encode_method_call(&crate::codec::MethodCall::new(
                "jailbroken",
                Value::Null,
            ))),
            reply: reply.map(ReplyId),
            message_data: MessageData(data),
        }
    }

    #[test]
    fn jailbreak_message_is_answered_and_cleaned_up() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();

        hook.handle_platform_message(&mut bridge, inbound("flutter_jailbreak_detection", Some(7), 0xBEEF));

        assert!(bridge.handled.is_empty());
        assert_eq!(bridge.replies.len(), 1);
        let (reply, payload) = &bridge.replies[0];
        assert_eq!(*reply, ReplyId(7));
        assert_eq!(payload.as_deref(), Some(&[0x00, 0x02][..]));
        assert_eq!(bridge.cleaned, vec![MessageData(0xBEEF)]);
    }

    #[test]
    fn pinning_message_answers_token() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();

        hook.handle_platform_message(&mut bridge, inbound("http_certificate_pinning", Some(3), 0));

        let payload = bridge.replies[0].1.clone().unwrap();
        assert_eq!(
            decode_envelope(&payload).unwrap(),
            Envelope::Success(Value::from("CONNECTION_SECURE"))
        );
        assert!(bridge.cleaned.is_empty());
    }

    #[test]
    fn message_without_reply_is_dropped() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();

        hook.handle_platform_message(&mut bridge, inbound("flutter_jailbreak_detection", None, 9));

        assert!(bridge.handled.is_empty());
        assert!(bridge.replies.is_empty());
        assert_eq!(bridge.cleaned, vec![MessageData(9)]);
    }

    #[test]
    fn other_inbound_and_null_channel_forward() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();

        hook.handle_platform_message(&mut bridge, inbound("plugins.flutter.io/shared_preferences", Some(1), 4));
        let mut unnamed = inbound("x", Some(2), 5);
        unnamed.channel = None;
        hook.handle_platform_message(&mut bridge, unnamed);
        hook.handle_platform_message(&mut bridge, inbound("talsec.app/freerasp/events", Some(3), 6));

        assert_eq!(bridge.handled.len(), 3);
        assert!(bridge.replies.is_empty());
        assert!(bridge.cleaned.is_empty());
    }

    #[test]
    fn telemetry_dispatch_is_dropped_but_end_of_stream_passes() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();
        let event = OutboundMessage {
            channel: "talsec.app/freerasp/events".to_owned(),
            payload: Some(Bytes::from_static(&[0x00, 0x07, 0x01, b'x'])),
            response: None,
        };
        let end = OutboundMessage {
            payload: None,
            ..event.clone()
        };

        hook.dispatch_platform_message(&mut bridge, event);
        hook.dispatch_platform_message(&mut bridge, end.clone());

        assert_eq!(bridge.dispatched, vec![end]);
    }

    #[test]
    fn dropped_dispatch_with_response_is_completed() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();

        hook.dispatch_platform_message(
            &mut bridge,
            OutboundMessage {
                channel: "freerasp".to_owned(),
                payload: Some(Bytes::from_static(&[0x00])),
                response: Some(ResponseId(11)),
            },
        );

        assert!(bridge.dispatched.is_empty());
        assert_eq!(bridge.responses, vec![(ResponseId(11), None)]);
    }

    #[test]
    fn other_dispatch_forwards() {
        let mut hook = BridgeInterceptor::new(&InterceptConfig::default());
        let mut bridge = Recording::default();
        let message = OutboundMessage {
            channel: "flutter_jailbreak_detection".to_owned(),
            payload: Some(Bytes::from_static(&[0x00])),
            response: Some(ResponseId(1)),
        };

        hook.dispatch_platform_message(&mut bridge, message.clone());

        assert_eq!(bridge.dispatched, vec![message]);
        assert!(bridge.responses.is_empty());
    }
}
