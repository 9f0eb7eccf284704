use std::sync::Arc;

use crate::channel::{MethodCall, MethodCallHandler, MethodResult};
use crate::classify::ChannelCategory;
use crate::forge::{ResponseForger, Verdict};
use crate::monitor::render_value;

/// Proxy around a detection plugin's method handler.
///
/// Intercepted methods are answered with a forged value and never reach the
/// plugin. Every other call is handed to the plugin with the original call
/// and result callback.
pub struct ForgingMethodHandler {
    channel: String,
    category: ChannelCategory,
    forger: Arc<ResponseForger>,
    inner: Box<dyn MethodCallHandler>,
}

impl ForgingMethodHandler {
    pub fn new(
        channel: impl Into<String>,
        category: ChannelCategory,
        forger: Arc<ResponseForger>,
        inner: Box<dyn MethodCallHandler>,
    ) -> Self {
        Self {
            channel: channel.into(),
            category,
            forger,
            inner,
        }
    }
}

impl MethodCallHandler for ForgingMethodHandler {
    fn on_method_call(&mut self, call: MethodCall, result: Box<dyn MethodResult>) {
        match self.forger.verdict(self.category, Some(&call.method)) {
            Verdict::Forge(forgery) => {
                tracing::info!(
                    channel = %self.channel,
                    method = %call.method,
                    value = %render_value(forgery.value()),
                    "[OVERRIDE]"
                );
                result.success(forgery.into_value());
            }
            Verdict::Passthrough | Verdict::Drop => {
                tracing::debug!(channel = %self.channel, method = %call.method, "passthrough");
                self.inner.on_method_call(call, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::codec::Value;

    #[derive(Debug, PartialEq)]
    enum Answer {
        Success(Value),
        Error(String),
        NotImplemented,
    }

    struct Capture(Arc<Mutex<Vec<Answer>>>);

    impl MethodResult for Capture {
        fn success(self: Box<Self>, value: Value) {
            self.0.lock().unwrap().push(Answer::Success(value));
        }

        fn error(self: Box<Self>, code: String, _message: Option<String>, _details: Value) {
            self.0.lock().unwrap().push(Answer::Error(code));
        }

        fn not_implemented(self: Box<Self>) {
            self.0.lock().unwrap().push(Answer::NotImplemented);
        }
    }

    fn proxy(category: ChannelCategory, seen: Arc<Mutex<Vec<MethodCall>>>) -> ForgingMethodHandler {
        let inner = move |call: MethodCall, result: Box<dyn MethodResult>| {
            seen.lock().unwrap().push(call);
            result.success(Value::Bool(true));
        };
        ForgingMethodHandler::new(
            "flutter_jailbreak_detection",
            category,
            Arc::new(ResponseForger::default()),
            Box::new(inner),
        )
    }

    #[test]
    fn forged_call_skips_plugin() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let answers = Arc::new(Mutex::new(Vec::new()));
        let mut handler = proxy(ChannelCategory::JailbreakMethodChannel, Arc::clone(&seen));

        handler.on_method_call(
            MethodCall::new("jailbroken", Value::Null),
            Box::new(Capture(Arc::clone(&answers))),
        );

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(*answers.lock().unwrap(), vec![Answer::Success(Value::Bool(false))]);
    }

    #[test]
    fn other_method_reaches_plugin_unchanged() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let answers = Arc::new(Mutex::new(Vec::new()));
        let mut handler = proxy(ChannelCategory::JailbreakMethodChannel, Arc::clone(&seen));
        let call = MethodCall::new("getPlatformVersion", Value::from("x"));

        handler.on_method_call(call.clone(), Box::new(Capture(Arc::clone(&answers))));

        assert_eq!(*seen.lock().unwrap(), vec![call]);
        assert_eq!(*answers.lock().unwrap(), vec![Answer::Success(Value::Bool(true))]);
    }

    #[test]
    fn pinning_check_answers_token() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let answers = Arc::new(Mutex::new(Vec::new()));
        let mut handler =
            proxy(ChannelCategory::CertificatePinningMethodChannel, Arc::clone(&seen));

        handler.on_method_call(
            MethodCall::new("check", Value::Map(Vec::new())),
            Box::new(Capture(Arc::clone(&answers))),
        );

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(
            *answers.lock().unwrap(),
            vec![Answer::Success(Value::from("CONNECTION_SECURE"))]
        );
    }
}
