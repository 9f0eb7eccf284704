//! Installing hooks into a host runtime.
//!
//! The runtime exposes two interposition slots: the named-channel
//! registration surface and the raw bridge. A profile is an ordered plan of
//! hooks; [`perform`] installs them one by one, and a failure is logged and
//! recorded without stopping the remaining hooks.

use std::fmt;

use crate::bridge::BridgeHook;
use crate::channel::ChannelHook;
use crate::config::{BridgeFallback, InterceptConfig};
use crate::error::HookError;
use crate::intercept::{BridgeInterceptor, RegistrationInterceptor};
use crate::monitor::{BridgeMonitor, ChannelMonitor};

/// Named-channel registration surface.
pub const METHOD_CHANNEL_SURFACE: &str = "io.flutter.plugin.common.MethodChannel";
/// Raw bridge surface.
pub const FLUTTER_JNI_SURFACE: &str = "io.flutter.embedding.engine.FlutterJNI";

/// Hook slots of a running host.
pub trait HostRuntime {
    fn install_channel_hook(&mut self, hook: Box<dyn ChannelHook>) -> Result<(), HookError>;
    fn install_bridge_hook(&mut self, hook: Box<dyn BridgeHook>) -> Result<(), HookError>;
}

type Installer = Box<dyn FnOnce(&mut dyn HostRuntime) -> Result<(), HookError>>;

/// When a planned hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Only if the named, earlier hook failed to install.
    OnlyIfFailed(&'static str),
}

/// One step of an installation plan.
pub struct PlannedHook {
    name: &'static str,
    condition: Condition,
    install: Installer,
}

impl PlannedHook {
    pub fn new<F>(name: &'static str, install: F) -> Self
    where
        F: FnOnce(&mut dyn HostRuntime) -> Result<(), HookError> + 'static,
    {
        Self {
            name,
            condition: Condition::Always,
            install: Box::new(install),
        }
    }

    pub fn only_if_failed(mut self, other: &'static str) -> Self {
        self.condition = Condition::OnlyIfFailed(other);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }
}

impl fmt::Debug for PlannedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedHook")
            .field("name", &self.name)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed,
    Skipped,
    Failed(HookError),
}

/// Per-hook result of [`perform`], in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    entries: Vec<(&'static str, Outcome)>,
}

impl InstallReport {
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn entries(&self) -> &[(&'static str, Outcome)] {
        &self.entries
    }

    pub fn installed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Installed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// True when at least one hook is active.
    pub fn any_installed(&self) -> bool {
        self.installed() > 0
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Installs `plan` in order. Called once the runtime is ready.
pub fn perform(runtime: &mut dyn HostRuntime, plan: Vec<PlannedHook>) -> InstallReport {
    let mut report = InstallReport::default();
    for hook in plan {
        let run = match hook.condition {
            Condition::Always => true,
            Condition::OnlyIfFailed(other) => {
                matches!(report.outcome(other), Some(Outcome::Failed(_)))
            }
        };
        if !run {
            tracing::debug!(hook = hook.name, "hook skipped");
            report.entries.push((hook.name, Outcome::Skipped));
            continue;
        }

        let outcome = match (hook.install)(&mut *runtime) {
            Ok(()) => {
                tracing::info!(hook = hook.name, "[✓] hook installed");
                Outcome::Installed
            }
            Err(e) => {
                tracing::warn!(hook = hook.name, error = %e, "[✗] hook failed");
                Outcome::Failed(e)
            }
        };
        report.entries.push((hook.name, outcome));
    }
    tracing::info!(
        installed = report.installed(),
        failed = report.failed(),
        "hook installation finished"
    );
    report
}

/// Appends the raw-bridge hook according to the configured fallback policy.
fn with_bridge_fallback(
    mut plan: Vec<PlannedHook>,
    fallback: BridgeFallback,
    primary: &'static str,
    bridge: PlannedHook,
) -> Vec<PlannedHook> {
    match fallback {
        BridgeFallback::OnFailure => plan.push(bridge.only_if_failed(primary)),
        BridgeFallback::Always => plan.push(bridge),
        BridgeFallback::Never => {}
    }
    plan
}

/// Forges detection replies and blocks telemetry.
pub fn bypass_profile(config: &InterceptConfig) -> Vec<PlannedHook> {
    let registration = RegistrationInterceptor::new(config);
    let bridge = BridgeInterceptor::new(config);
    with_bridge_fallback(
        vec![PlannedHook::new("registration", move |rt| {
            rt.install_channel_hook(Box::new(registration))
        })],
        config.bridge_fallback,
        "registration",
        PlannedHook::new("bridge", move |rt| rt.install_bridge_hook(Box::new(bridge))),
    )
}

/// Logs all channel traffic without changing it.
///
/// Raw bridge traffic (empty dispatches, host-side responses) is only
/// visible at the bridge, so the bridge monitor is installed alongside the
/// channel monitor unless the policy is [`BridgeFallback::Never`].
pub fn monitor_profile(config: &InterceptConfig) -> Vec<PlannedHook> {
    let bridge = BridgeMonitor::new(config);
    let fallback = match config.bridge_fallback {
        BridgeFallback::Never => BridgeFallback::Never,
        BridgeFallback::OnFailure | BridgeFallback::Always => BridgeFallback::Always,
    };
    with_bridge_fallback(
        vec![PlannedHook::new("channel-monitor", |rt| {
            rt.install_channel_hook(Box::new(ChannelMonitor::new()))
        })],
        fallback,
        "channel-monitor",
        PlannedHook::new("bridge-monitor", move |rt| {
            rt.install_bridge_hook(Box::new(bridge))
        }),
    )
}
