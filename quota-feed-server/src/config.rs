use quota_feed::{
    BootstrapScope, FeedConfig, SchedulerConfig, Timeframe, UpstreamConfig,
    broadcast::BroadcastConfig,
    quota::{DEFAULT_QUOTA_LIMIT, UPSTREAM_HARD_CAP},
    scheduler::config::{DEFAULT_CANDLE_OUTPUTSIZE, DEFAULT_TICK_PERIOD},
    upstream::{DEFAULT_BASE_URL, DEFAULT_SYMBOL},
};
use std::{env, fmt::Display, str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

/// Upper bound on bars per `time_series` request accepted by the upstream.
const MAX_CANDLE_OUTPUTSIZE: u16 = 5_000;

/// Server configuration derived from environment variables.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
    pub log_format: LogFormat,

    // Upstream
    pub api_key: String,
    pub symbol: String,
    pub base_url: Url,

    // Budget
    pub quota_limit: usize,
    pub hard_cap: usize,

    // Scheduling
    pub poll_interval: Duration,
    pub default_timeframe: Timeframe,
    pub candle_outputsize: u16,

    // Fan-out
    pub keep_alive: Duration,
    pub bootstrap_all_timeframes: bool,
}

/// Startup configuration failure. Fatal: the server never starts serving.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("QUOTA_LIMIT {limit} must be at least 1 and below UPSTREAM_HARD_CAP {hard_cap}")]
    QuotaOverHardCap { limit: usize, hard_cap: usize },
}

/// Log output format selected with `LOG_FORMAT`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected pretty or json, got {other}")),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup, eg/ a fixed map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = var("UPSTREAM_API_KEY").ok_or(ConfigError::Missing("UPSTREAM_API_KEY"))?;

        let base_url = match var("UPSTREAM_BASE_URL") {
            Some(raw) => Url::parse(&raw).map_err(|error| invalid("UPSTREAM_BASE_URL", &raw, error))?,
            None => Url::parse(DEFAULT_BASE_URL)
                .map_err(|error| invalid("UPSTREAM_BASE_URL", DEFAULT_BASE_URL, error))?,
        };

        let quota_limit = parse(&var, "QUOTA_LIMIT", DEFAULT_QUOTA_LIMIT)?;
        let hard_cap = parse(&var, "UPSTREAM_HARD_CAP", UPSTREAM_HARD_CAP)?;
        if quota_limit == 0 || quota_limit >= hard_cap {
            return Err(ConfigError::QuotaOverHardCap {
                limit: quota_limit,
                hard_cap,
            });
        }

        let poll_interval_ms = positive(
            "POLL_INTERVAL_MS",
            parse(&var, "POLL_INTERVAL_MS", DEFAULT_TICK_PERIOD.as_millis() as u64)?,
        )?;

        let candle_outputsize = parse(&var, "CANDLE_OUTPUTSIZE", DEFAULT_CANDLE_OUTPUTSIZE)?;
        if candle_outputsize == 0 || candle_outputsize > MAX_CANDLE_OUTPUTSIZE {
            return Err(invalid(
                "CANDLE_OUTPUTSIZE",
                &candle_outputsize.to_string(),
                format!("must be between 1 and {MAX_CANDLE_OUTPUTSIZE}"),
            ));
        }

        let keep_alive_secs = positive("KEEPALIVE_SECS", parse(&var, "KEEPALIVE_SECS", 25_u64)?)?;

        Ok(Self {
            bind_host: var("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&var, "PORT", 3000)?,
            log_format: parse(&var, "LOG_FORMAT", LogFormat::default())?,
            api_key,
            symbol: var("FEED_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            base_url,
            quota_limit,
            hard_cap,
            poll_interval: Duration::from_millis(poll_interval_ms),
            default_timeframe: parse(&var, "DEFAULT_TIMEFRAME", Timeframe::default())?,
            candle_outputsize,
            keep_alive: Duration::from_secs(keep_alive_secs),
            bootstrap_all_timeframes: parse_bool(&var, "BOOTSTRAP_ALL_TIMEFRAMES", true)?,
        })
    }

    pub fn feed_config(&self) -> FeedConfig {
        let mut feed = FeedConfig::new(UpstreamConfig::new(
            self.base_url.clone(),
            self.api_key.clone(),
            self.symbol.as_str(),
        ));

        feed.quota_limit = self.quota_limit;
        feed.default_timeframe = self.default_timeframe;
        feed.scheduler = SchedulerConfig::default()
            .with_tick_period(self.poll_interval)
            .with_candle_outputsize(self.candle_outputsize);
        feed.broadcast = BroadcastConfig {
            keep_alive_interval: self.keep_alive,
            bootstrap: if self.bootstrap_all_timeframes {
                BootstrapScope::AllTimeframes
            } else {
                BootstrapScope::ActiveTimeframe
            },
            ..BroadcastConfig::default()
        };

        feed
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_host", &self.bind_host)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("api_key", &"<redacted>")
            .field("symbol", &self.symbol)
            .field("base_url", &self.base_url.as_str())
            .field("quota_limit", &self.quota_limit)
            .field("hard_cap", &self.hard_cap)
            .field("poll_interval", &self.poll_interval)
            .field("default_timeframe", &self.default_timeframe)
            .field("candle_outputsize", &self.candle_outputsize)
            .field("keep_alive", &self.keep_alive)
            .field("bootstrap_all_timeframes", &self.bootstrap_all_timeframes)
            .finish()
    }
}

fn invalid(name: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(
    var: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match var(name) {
        Some(raw) => raw.parse().map_err(|error| invalid(name, &raw, error)),
        None => Ok(default),
    }
}

fn parse_bool(
    var: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = var(name) else {
        return Ok(default);
    };

    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(invalid(name, &raw, "expected a boolean")),
    }
}

fn positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(invalid(name, "0", "must be greater than zero"))
    } else {
        Ok(value)
    }
}
