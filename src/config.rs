//! Environment configuration for console presentation.

use std::env;
use std::time::Duration;

use crate::progress::HeartbeatPolicy;

pub const NO_PROGRESS_ENV_VAR: &str = "ARTIFICE_NO_PROGRESS";
pub const HEARTBEAT_MS_ENV_VAR: &str = "ARTIFICE_HEARTBEAT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub no_progress: bool,
    pub heartbeat: HeartbeatPolicy,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            no_progress: env_flag(NO_PROGRESS_ENV_VAR),
            heartbeat: env_u64_opt(HEARTBEAT_MS_ENV_VAR)
                .map(|millis| match millis {
                    0 => HeartbeatPolicy::Immediate,
                    millis => HeartbeatPolicy::AfterQuiet(Duration::from_millis(millis)),
                })
                .unwrap_or_default(),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_u64_opt(key: &str) -> Option<u64> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(%key, %value, "ignoring non-numeric value");
            None
        }
    }
}
