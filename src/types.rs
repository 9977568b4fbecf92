use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Which executor backend to use for remote commands.
///
/// - `Local`: run commands with `sh -c` on this machine; the target is only
///   used for logging.
/// - `Kubectl`: run commands inside a pod with `kubectl exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Local,
    #[default]
    Kubectl,
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ExecutorKind::Local),
            "kubectl" => Ok(ExecutorKind::Kubectl),
            other => Err(format!(
                "invalid executor kind: {other} (expected \"local\" or \"kubectl\")"
            )),
        }
    }
}

/// A named place where commands run: a pod (optionally namespaced, optionally
/// a specific container), or just a label for the local executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub name: String,
    pub namespace: Option<String>,
    pub container: Option<String>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            container: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{ns}/")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(c) = &self.container {
            write!(f, ":{c}")?;
        }
        Ok(())
    }
}

/// Parses `namespace/name[:container]`, `name[:container]`.
impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (rest, container) = match s.split_once(':') {
            Some((rest, c)) if !c.is_empty() => (rest, Some(c.to_string())),
            Some(_) => return Err(format!("empty container in target '{s}'")),
            None => (s, None),
        };
        let (namespace, name) = match rest.split_once('/') {
            Some((ns, name)) if !ns.is_empty() => (Some(ns.to_string()), name),
            Some(_) => return Err(format!("empty namespace in target '{s}'")),
            None => (None, rest),
        };
        if name.is_empty() || name.contains('/') {
            return Err(format!("invalid target '{s}'; expected namespace/name[:container]"));
        }
        Ok(Target {
            name: name.to_string(),
            namespace,
            container,
        })
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
