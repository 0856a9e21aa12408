//! Configuration of the command log daemon.

use clap::Parser;
use std::time::Duration;

/// Socket server that retains the most recent commands it receives.
#[derive(Debug, Clone, Parser)]
#[command(name = "cmdringd", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "CMDRING_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on.
    #[arg(long, env = "CMDRING_PORT", default_value = "9000")]
    pub port: u16,

    /// Seconds between timestamp commands. Disabled when not set.
    #[arg(long, env = "CMDRING_TIMESTAMP_INTERVAL")]
    pub timestamp_interval: Option<u64>,

    /// Log format (json or text).
    #[arg(long, env = "CMDRING_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CMDRING_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Check values that clap cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }

        if self.timestamp_interval == Some(0) {
            anyhow::bail!("timestamp interval must be at least 1 second");
        }

        Ok(())
    }

    /// Address the server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between timestamp commands, if enabled.
    pub fn timestamp_interval(&self) -> Option<Duration> {
        self.timestamp_interval.map(Duration::from_secs)
    }
}
