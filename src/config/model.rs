// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::poll::TimeoutConfig;
use crate::types::ExecutorKind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [executor]
/// kind = "kubectl"
/// kubectl = "kubectl"
/// kubectl_args = ["--context", "kind-test"]
///
/// [timeouts]
/// short = "10s"
/// mid = "30s"
/// helper = "4m"
/// poll_interval = "1s"
/// grace_period = "5s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub timeouts: RawTimeoutsSection,
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// `"local"` or `"kubectl"` (default).
    #[serde(default)]
    pub kind: ExecutorKind,

    /// Binary used for `kubectl exec` and workload commands.
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    /// Extra arguments placed right after the binary (e.g. `--context`).
    #[serde(default)]
    pub kubectl_args: Vec<String>,
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            kubectl: default_kubectl(),
            kubectl_args: Vec::new(),
        }
    }
}

/// `[timeouts]` section, as duration strings (`"250ms"`, `"3s"`, `"1m"`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawTimeoutsSection {
    /// Bound for a single one-shot probe command.
    #[serde(default = "default_short")]
    pub short: String,

    /// Default bound for pattern watches and their scope.
    #[serde(default = "default_mid")]
    pub mid: String,

    /// Default bound for readiness polls and pod waits.
    #[serde(default = "default_helper")]
    pub helper: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// How long closing a scope waits for consumers before aborting them.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
}

fn default_short() -> String {
    "10s".to_string()
}

fn default_mid() -> String {
    "30s".to_string()
}

fn default_helper() -> String {
    "4m".to_string()
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

fn default_grace_period() -> String {
    "5s".to_string()
}

impl Default for RawTimeoutsSection {
    fn default() -> Self {
        Self {
            short: default_short(),
            mid: default_mid(),
            helper: default_helper(),
            poll_interval: default_poll_interval(),
            grace_period: default_grace_period(),
        }
    }
}

/// Parsed `[timeouts]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub short: Duration,
    pub mid: Duration,
    pub helper: Duration,
    pub poll_interval: Duration,
    pub grace_period: Duration,
}

impl Timeouts {
    /// Poll settings for readiness checks: `helper` overall, one attempt per
    /// `poll_interval`, each attempt bounded by `short`.
    pub fn readiness(&self) -> TimeoutConfig {
        TimeoutConfig::new(self.helper)
            .with_interval(self.poll_interval)
            .with_attempt_timeout(self.short)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(10),
            mid: Duration::from_secs(30),
            helper: Duration::from_secs(4 * 60),
            poll_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Validated configuration.
///
/// Constructed through `TryFrom<RawConfigFile>`, which parses and checks the
/// duration strings.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub timeouts: Timeouts,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(executor: ExecutorSection, timeouts: Timeouts) -> Self {
        Self { executor, timeouts }
    }
}
