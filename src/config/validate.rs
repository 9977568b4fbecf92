// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, RawTimeoutsSection, Timeouts};
use crate::errors::{ExecwatchError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ExecwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        let timeouts = parse_timeouts(&raw.timeouts)?;
        Ok(ConfigFile::new_unchecked(raw.executor, timeouts))
    }
}

/// Check invariants that `serde` cannot express.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_executor(cfg)?;
    let timeouts = parse_timeouts(&cfg.timeouts)?;
    validate_timeouts(&timeouts)?;
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.kubectl.trim().is_empty() {
        return Err(ExecwatchError::ConfigError(
            "[executor].kubectl must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_timeouts(t: &Timeouts) -> Result<()> {
    if t.poll_interval.is_zero() {
        return Err(ExecwatchError::ConfigError(
            "[timeouts].poll_interval must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn parse_timeouts(raw: &RawTimeoutsSection) -> Result<Timeouts> {
    Ok(Timeouts {
        short: parse_field("short", &raw.short)?,
        mid: parse_field("mid", &raw.mid)?,
        helper: parse_field("helper", &raw.helper)?,
        poll_interval: parse_field("poll_interval", &raw.poll_interval)?,
        grace_period: parse_field("grace_period", &raw.grace_period)?,
    })
}

fn parse_field(name: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| {
        ExecwatchError::ConfigError(format!("[timeouts].{name} = {value:?}: {e}"))
    })
}
