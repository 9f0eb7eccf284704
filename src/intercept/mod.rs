//! Interception engine.
//!
//! Two layers make the same decision. [`RegistrationInterceptor`] wraps
//! handlers as the application registers them on the named-channel API;
//! [`BridgeInterceptor`] sits on the raw bridge and is the fallback when the
//! registration surface cannot be hooked.

pub mod bridge;
pub mod method;
pub mod stream;

use std::sync::Arc;

use crate::channel::{ChannelHook, MethodCallHandler, StreamHandler};
use crate::classify::{ChannelCategory, ChannelClassifier};
use crate::config::InterceptConfig;
use crate::forge::ResponseForger;

pub use bridge::BridgeInterceptor;
pub use method::ForgingMethodHandler;
pub use stream::{BlockingEventSink, BlockingStreamHandler, StreamSession};

/// Classifier and forger shared by every proxy the engine creates.
#[derive(Debug, Clone)]
pub struct Interceptor {
    classifier: ChannelClassifier,
    forger: Arc<ResponseForger>,
}

impl Interceptor {
    pub fn new(config: &InterceptConfig) -> Self {
        Self {
            classifier: ChannelClassifier::new(config),
            forger: Arc::new(ResponseForger::new(config)),
        }
    }

    pub fn classify(&self, channel: Option<&str>) -> ChannelCategory {
        self.classifier.classify(channel)
    }

    pub fn forger(&self) -> &ResponseForger {
        &self.forger
    }

    /// Returns the handler to install for `channel`.
    ///
    /// Jailbreak and pinning channels get a [`ForgingMethodHandler`] around
    /// `handler`; any other channel gets `handler` itself back.
    pub fn wrap_method_handler(
        &self,
        channel: &str,
        handler: Box<dyn MethodCallHandler>,
    ) -> Box<dyn MethodCallHandler> {
        let category = self.classify(Some(channel));
        match category {
            ChannelCategory::JailbreakMethodChannel
            | ChannelCategory::CertificatePinningMethodChannel => {
                tracing::info!(channel, category = %category, "wrapping method handler");
                Box::new(ForgingMethodHandler::new(
                    channel,
                    category,
                    Arc::clone(&self.forger),
                    handler,
                ))
            }
            _ => {
                tracing::debug!(channel, category = %category, "method handler left untouched");
                handler
            }
        }
    }

    /// Returns the handler to install for `channel`.
    ///
    /// Telemetry channels get a [`BlockingStreamHandler`]; any other channel
    /// gets `handler` itself back.
    pub fn wrap_stream_handler(
        &self,
        channel: &str,
        handler: Box<dyn StreamHandler>,
    ) -> Box<dyn StreamHandler> {
        let category = self.classify(Some(channel));
        if category == ChannelCategory::ThreatTelemetryStream {
            tracing::info!(channel, category = %category, "wrapping stream handler");
            Box::new(BlockingStreamHandler::new(channel, handler))
        } else {
            tracing::debug!(channel, category = %category, "stream handler left untouched");
            handler
        }
    }
}

/// [`ChannelHook`] applying [`Interceptor`] at handler registration.
#[derive(Debug, Clone)]
pub struct RegistrationInterceptor {
    interceptor: Interceptor,
}

impl RegistrationInterceptor {
    pub fn new(config: &InterceptConfig) -> Self {
        Self {
            interceptor: Interceptor::new(config),
        }
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }
}

impl ChannelHook for RegistrationInterceptor {
    fn set_method_call_handler(
        &mut self,
        channel: &str,
        handler: Box<dyn MethodCallHandler>,
    ) -> Box<dyn MethodCallHandler> {
        self.interceptor.wrap_method_handler(channel, handler)
    }

    fn set_stream_handler(
        &mut self,
        channel: &str,
        handler: Box<dyn StreamHandler>,
    ) -> Box<dyn StreamHandler> {
        self.interceptor.wrap_stream_handler(channel, handler)
    }
}
