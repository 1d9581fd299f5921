use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::entities::StrategyMergePolicy;
use crate::domain::errors::ConfigError;

pub const DEFAULT_ENGINE_URL: &str = "ws://localhost:8000/api/stream";
pub const DEFAULT_HTTP_BIND_ADDR: &str = "127.0.0.1:3000";

/// Settings for the engine link, the state store and the HTTP surface
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub url: String,
    /// Base of the linear backoff: attempt N waits N times this
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub heartbeat_interval: Duration,
    pub pong_timeout: Duration,
    /// How long `send` waits for a connection before failing
    pub send_timeout: Duration,
    pub queue_capacity: usize,
    pub connect_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub strategy_merge_policy: StrategyMergePolicy,
    pub http_bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENGINE_URL.to_string(),
            reconnect_interval: Duration::from_secs(2),
            max_reconnect_attempts: 10,
            heartbeat_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(5),
            queue_capacity: 100,
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(1),
            strategy_merge_policy: StrategyMergePolicy::Replace,
            http_bind_addr: DEFAULT_HTTP_BIND_ADDR.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or invalid keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("ENGINE_WS_URL") {
            let url = url.trim();
            if url.is_empty() {
                tracing::warn!("ENGINE_WS_URL is empty, using default: {}", config.url);
            } else {
                config.url = url.to_string();
            }
        }

        if let Some(ms) = millis(&lookup, "ENGINE_RECONNECT_INTERVAL_MS") {
            config.reconnect_interval = ms;
        }
        if let Some(ms) = millis(&lookup, "ENGINE_HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval = ms;
        }
        if let Some(ms) = millis(&lookup, "ENGINE_PONG_TIMEOUT_MS") {
            config.pong_timeout = ms;
        }
        if let Some(ms) = millis(&lookup, "ENGINE_SEND_TIMEOUT_MS") {
            config.send_timeout = ms;
        }
        if let Some(ms) = millis(&lookup, "ENGINE_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = ms;
        }

        if let Some(attempts) = positive::<u32>(&lookup, "ENGINE_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(capacity) = positive::<usize>(&lookup, "ENGINE_QUEUE_CAPACITY") {
            config.queue_capacity = capacity;
        }

        if let Some(policy) = lookup("STRATEGY_MERGE_POLICY") {
            match policy.parse::<StrategyMergePolicy>() {
                Ok(value) => config.strategy_merge_policy = value,
                Err(e) => {
                    tracing::warn!(
                        "Invalid STRATEGY_MERGE_POLICY: {}, using default: {:?}",
                        e,
                        config.strategy_merge_policy
                    );
                }
            }
        }

        if let Some(addr) = lookup("HTTP_BIND_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(_) => config.http_bind_addr = addr,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse HTTP_BIND_ADDR '{}': {}, using default: {}",
                        addr,
                        e,
                        config.http_bind_addr
                    );
                }
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let durations = [
            ("reconnect interval", self.reconnect_interval),
            ("heartbeat interval", self.heartbeat_interval),
            ("pong timeout", self.pong_timeout),
            ("send timeout", self.send_timeout),
            ("connect timeout", self.connect_timeout),
            ("disconnect timeout", self.disconnect_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::MustBePositive(name));
            }
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ConfigError::MustBePositive("max reconnect attempts"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::MustBePositive("queue capacity"));
        }

        self.http_bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddress(self.http_bind_addr.clone()))?;

        Ok(())
    }

    /// Window after the last pong before the link is presumed half-open
    pub fn liveness_window(&self) -> Duration {
        self.pong_timeout + self.heartbeat_interval
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    positive::<u64>(lookup, key).map(Duration::from_millis)
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        Ok(value) => {
            tracing::warn!("Invalid {} value: {} (must be positive), using default", key, value);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} '{}': {}, using default", key, raw, e);
            None
        }
    }
}
