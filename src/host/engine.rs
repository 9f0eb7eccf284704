use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::bridge::{
    MessageData, OutboundMessage, PlatformBridge, PlatformMessage, ReplyId, ResponseId,
};
use crate::codec::{decode_envelope, Envelope, Value};
use crate::error::{BridgeError, CodecError};

use super::messenger::Messenger;

/// First native buffer handle handed out; zero is reserved for "none".
const FIRST_HANDLE: u64 = 0x1000;

/// The host's reply to one Dart-to-host message, as Dart received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    payload: Option<Bytes>,
}

impl Reply {
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// An empty reply: no handler, or a method the handler does not implement.
    pub fn is_empty(&self) -> bool {
        self.payload.as_ref().map_or(true, Bytes::is_empty)
    }

    pub fn envelope(&self) -> Result<Envelope, CodecError> {
        match self.payload.as_deref() {
            Some(bytes) if !bytes.is_empty() => decode_envelope(bytes),
            _ => Err(CodecError::EmptyPayload),
        }
    }

    /// The value of a success envelope.
    pub fn success_value(&self) -> Option<Value> {
        match self.envelope() {
            Ok(Envelope::Success(value)) => Some(value),
            _ => None,
        }
    }
}

/// Dart side of the bridge: reply ledger, native buffer handles and the
/// messages the host dispatched to Dart.
#[derive(Debug)]
pub struct DartEndpoint {
    next_reply: i32,
    next_handle: u64,
    awaiting: HashSet<ReplyId>,
    replies: HashMap<ReplyId, Reply>,
    live_data: HashSet<MessageData>,
    received: Vec<OutboundMessage>,
}

impl Default for DartEndpoint {
    fn default() -> Self {
        Self {
            next_reply: 1,
            next_handle: FIRST_HANDLE,
            awaiting: HashSet::new(),
            replies: HashMap::new(),
            live_data: HashSet::new(),
            received: Vec::new(),
        }
    }
}

impl DartEndpoint {
    /// Builds an outgoing message, allocating a reply id and, for non-empty
    /// payloads, a native buffer handle.
    pub fn prepare(
        &mut self,
        channel: Option<&str>,
        payload: Option<Bytes>,
        expect_reply: bool,
    ) -> PlatformMessage {
        let reply = expect_reply.then(|| {
            let id = ReplyId(self.next_reply);
            self.next_reply = self.next_reply.wrapping_add(1);
            self.awaiting.insert(id);
            id
        });
        let message_data = match payload {
            Some(_) => {
                let handle = MessageData(self.next_handle);
                self.next_handle += 1;
                self.live_data.insert(handle);
                handle
            }
            None => MessageData::NONE,
        };
        PlatformMessage {
            channel: channel.map(str::to_owned),
            payload,
            reply,
            message_data,
        }
    }

    fn complete(&mut self, reply: ReplyId, payload: Option<Bytes>) -> Result<(), BridgeError> {
        if self.replies.contains_key(&reply) {
            return Err(BridgeError::DuplicateReply(reply));
        }
        if !self.awaiting.remove(&reply) {
            return Err(BridgeError::UnknownReply(reply));
        }
        self.replies.insert(reply, Reply { payload });
        Ok(())
    }

    fn release(&mut self, handle: MessageData) -> Result<(), BridgeError> {
        if self.live_data.remove(&handle) {
            Ok(())
        } else {
            Err(BridgeError::UnknownMessageData(handle.0))
        }
    }

    pub fn reply(&self, id: ReplyId) -> Option<&Reply> {
        self.replies.get(&id)
    }

    /// Reply ids still waiting for an answer.
    pub fn awaiting(&self) -> usize {
        self.awaiting.len()
    }

    /// Native buffers not yet cleaned up.
    pub fn live_message_data(&self) -> usize {
        self.live_data.len()
    }

    pub fn received(&self) -> &[OutboundMessage] {
        &self.received
    }
}

/// Native side of the bridge: routes inbound messages to the messenger,
/// cleans up their buffers, and hands outbound messages to Dart.
pub struct NativeBridge {
    messenger: Messenger,
    dart: DartEndpoint,
    errors: Vec<BridgeError>,
}

impl NativeBridge {
    pub(crate) fn new(messenger: Messenger) -> Self {
        Self {
            messenger,
            dart: DartEndpoint::default(),
            errors: Vec::new(),
        }
    }

    pub fn messenger(&mut self) -> &mut Messenger {
        &mut self.messenger
    }

    pub fn dart(&self) -> &DartEndpoint {
        &self.dart
    }

    pub fn dart_mut(&mut self) -> &mut DartEndpoint {
        &mut self.dart
    }

    /// Protocol violations observed on the bridge.
    pub fn errors(&self) -> &[BridgeError] {
        &self.errors
    }

    pub(crate) fn record(&mut self, result: Result<(), BridgeError>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "bridge protocol violation");
            self.errors.push(e);
        }
    }
}

impl PlatformBridge for NativeBridge {
    fn handle_platform_message(&mut self, message: PlatformMessage) {
        self.messenger
            .handle_message(message.channel.as_deref(), message.payload, message.reply);
        if message.message_data.is_some() {
            let result = self.cleanup_message_data(message.message_data);
            self.record(result);
        }
    }

    fn dispatch_platform_message(&mut self, message: OutboundMessage) {
        self.dart.received.push(message);
    }

    fn handle_platform_message_response(&mut self, response: ResponseId, payload: Option<Bytes>) {
        self.messenger.handle_response(response, payload);
    }

    fn invoke_platform_message_response_callback(
        &mut self,
        reply: ReplyId,
        payload: Option<Bytes>,
    ) -> Result<(), BridgeError> {
        self.dart.complete(reply, payload)
    }

    fn cleanup_message_data(&mut self, handle: MessageData) -> Result<(), BridgeError> {
        self.dart.release(handle)
    }
}
