use clap::Parser;
use humantime_serde::re::humantime;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::error::{PipelineError, PipelineResult};
use crate::rate_limiter::RateLimitSettings;
use crate::schema::Schema;

fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

/// Service configuration, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "event-gate", version, about)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL; events are logged and discarded when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Channel accepted events are published to
    #[arg(long, env = "EVENTS_TOPIC", default_value = "events-topic")]
    pub events_topic: String,

    /// Requests allowed per client within the rate window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 100)]
    pub rate_limit: u32,

    /// Length of the sliding rate limit window
    #[arg(long, env = "RATE_WINDOW", default_value = "60s", value_parser = parse_duration)]
    pub rate_window: Duration,

    /// Tracked client count above which idle clients are swept
    #[arg(long, env = "RATE_LIMIT_SWEEP_THRESHOLD", default_value_t = 1000)]
    pub sweep_threshold: usize,

    /// Upper bound on a single publish call
    #[arg(long, env = "PUBLISH_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub publish_timeout: Duration,

    /// JSON file describing the field schema; the built-in event schema is used when unset
    #[arg(long, env = "SCHEMA_PATH")]
    pub schema_path: Option<PathBuf>,

    /// Log level for this crate when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from command line arguments and environment variables
    pub fn from_env() -> Self {
        Config::parse()
    }

    pub fn rate_limit_settings(&self) -> PipelineResult<RateLimitSettings> {
        let settings = RateLimitSettings {
            max_requests: self.rate_limit,
            window: self.rate_window,
            sweep_threshold: self.sweep_threshold,
        };
        settings
            .validate()
            .map_err(|e| PipelineError::Configuration(format!("invalid rate limit settings: {}", e)))?;
        Ok(settings)
    }

    pub fn load_schema(&self) -> PipelineResult<Schema> {
        match &self.schema_path {
            Some(path) => Schema::from_file(path),
            None => Ok(Schema::events()),
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.events_topic.trim().is_empty() {
            return Err(PipelineError::Configuration("events topic cannot be empty".to_string()));
        }
        if self.publish_timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "publish timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = &self.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(PipelineError::Configuration(
                    "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
                ));
            }
        }
        self.rate_limit_settings()?;
        Ok(())
    }
}
