use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use bridge_core::{HandoffPolicy, PollTimings};

#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Slot store settings
    pub redis_url: String,
    pub memory_store: bool,

    // Long-poll timing contract
    pub dequeue_timeout_secs: f64,
    pub fast_poll_secs: f64,
    pub slow_poll_secs: f64,
    pub allowed_fast_polls: i64,

    // Protocol settings
    pub strict_handoff: bool,
    pub pad_responses: bool,

    // Logging
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenv::dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 5000)?,

            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string()),
            memory_store: parse_var("BRIDGE_MEMORY_STORE", false)?,

            dequeue_timeout_secs: parse_var("JUPYTER_DEQUEUE_TIMEOUT_SECS", 15.0)?,
            fast_poll_secs: parse_var("JUPYTER_FAST_BRIDGE_POLL_SECS", 0.1)?,
            slow_poll_secs: parse_var("JUPYTER_SLOW_BRIDGE_POLL_SECS", 2.0)?,
            allowed_fast_polls: parse_var("JUPYTER_ALLOWED_FAST_DEQUEUE_POLLS", 10)?,

            strict_handoff: parse_var("JUPYTER_BRIDGE_STRICT_HANDOFF", false)?,
            pad_responses: parse_var("JUPYTER_BRIDGE_PAD_RESPONSES", true)?,

            log_dir: env::var("JUPYTER_BRIDGE_LOG_DIR")
                .unwrap_or_else(|_| "./log".to_string())
                .into(),
        })
    }

    pub fn poll_timings(&self) -> PollTimings {
        PollTimings {
            dequeue_timeout: Duration::from_secs_f64(self.dequeue_timeout_secs),
            fast_poll: Duration::from_secs_f64(self.fast_poll_secs),
            slow_poll: Duration::from_secs_f64(self.slow_poll_secs),
            allowed_fast_polls: self.allowed_fast_polls,
            // Channel TTL is part of the storage contract, not tunable.
            ..PollTimings::default()
        }
    }

    pub fn handoff_policy(&self) -> HandoffPolicy {
        if self.strict_handoff {
            HandoffPolicy::Strict
        } else {
            HandoffPolicy::Relaxed
        }
    }
}

/// Unparsable values abort startup; a relay running with a half-applied
/// timing contract is worse than one that refuses to start.
fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {name}={raw}: {e}")),
        Err(_) => Ok(default),
    }
}
