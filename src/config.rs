use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::gateway::BreakerSettings;

pub const GATEWAY_A: &str = "gateway_a";
pub const GATEWAY_B: &str = "gateway_b";

/// Connection, retry and breaker settings for one gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub breaker: BreakerSettings,
}

impl GatewaySettings {
    /// Defaults for everything except the URL.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            breaker: BreakerSettings {
                max_consecutive_failures: 3,
                max_total_failures: None,
                interval: Duration::from_secs(60),
                open_timeout: Duration::from_secs(30),
                max_half_open_requests: 5,
            },
        }
    }

    fn from_env(prefix: &str, default_max_total: Option<u32>) -> Result<Self> {
        let key = |suffix: &str| format!("{}_{}", prefix, suffix);

        let base_url = env::var(key("API_BASE_URL"))
            .with_context(|| format!("{} must be set", key("API_BASE_URL")))?;
        let defaults = Self::for_base_url(base_url);

        let max_total_failures = match env::var(key("CB_MAX_TOTAL_FAILURES")) {
            Ok(raw) if !raw.trim().is_empty() => Some(parse(&key("CB_MAX_TOTAL_FAILURES"), &raw)?),
            _ => default_max_total,
        };

        Ok(Self {
            request_timeout: env_millis(&key("REQUEST_TIMEOUT_MS"), defaults.request_timeout)?,
            retry_attempts: env_or(&key("RETRY_ATTEMPT"), defaults.retry_attempts)?,
            retry_delay: env_millis(&key("RETRY_DELAY_MS"), defaults.retry_delay)?,
            breaker: BreakerSettings {
                max_consecutive_failures: env_or(
                    &key("CB_MAX_CONSECUTIVE_FAILURES"),
                    defaults.breaker.max_consecutive_failures,
                )?,
                max_total_failures,
                interval: env_millis(&key("CB_INTERVAL_MS"), defaults.breaker.interval)?,
                open_timeout: env_millis(&key("CB_TIMEOUT_MS"), defaults.breaker.open_timeout)?,
                max_half_open_requests: env_or(
                    &key("CB_MAX_REQUESTS"),
                    defaults.breaker.max_half_open_requests,
                )?,
            },
            base_url: defaults.base_url,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Callback URL with `{wallet_id}` and `{transaction_id}` placeholders.
    pub payment_callback_pattern: String,
    pub queue_poll_interval: Duration,
    pub log_request_body: bool,
    pub gateway_a: GatewaySettings,
    pub gateway_b: GatewaySettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env_or("SERVER_PORT", 8080)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            payment_callback_pattern: env::var("PAYMENT_CALLBACK_PATTERN")
                .context("PAYMENT_CALLBACK_PATTERN must be set")?,
            queue_poll_interval: env_millis("QUEUE_POLL_INTERVAL_MS", Duration::from_secs(1))?,
            log_request_body: env_or("LOG_REQUEST_BODY", false)?,
            gateway_a: GatewaySettings::from_env("GATEWAY_A", Some(5))?,
            gateway_b: GatewaySettings::from_env("GATEWAY_B", None)?,
        })
    }

    /// Registered gateways, in registration order.
    pub fn gateways(&self) -> [(&'static str, &GatewaySettings); 2] {
        [(GATEWAY_A, &self.gateway_a), (GATEWAY_B, &self.gateway_b)]
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", key, raw))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => parse(key, &raw),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => parse::<u64>(key, &raw).map(Duration::from_millis),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_key() {
        let err = parse::<u32>("GATEWAY_A_RETRY_ATTEMPT", "three").unwrap_err();
        assert!(err.to_string().contains("GATEWAY_A_RETRY_ATTEMPT"));
        assert_eq!(parse::<u32>("X", " 7 ").unwrap(), 7);
        assert!(parse::<bool>("LOG_REQUEST_BODY", "true").unwrap());
    }

    #[test]
    fn test_gateway_defaults() {
        let settings = GatewaySettings::for_base_url("http://localhost:8081");
        assert_eq!(settings.retry_attempts, 3);
        assert_eq!(settings.retry_delay, Duration::from_secs(1));
        assert_eq!(settings.breaker.max_consecutive_failures, 3);
        assert_eq!(settings.breaker.max_half_open_requests, 5);
    }

    #[test]
    fn test_gateway_settings_from_env() {
        env::set_var("CFGTEST_API_BASE_URL", "http://gateway.test");
        env::set_var("CFGTEST_RETRY_ATTEMPT", "5");
        env::set_var("CFGTEST_CB_TIMEOUT_MS", "250");
        env::set_var("CFGTEST_CB_MAX_TOTAL_FAILURES", "9");

        let settings = GatewaySettings::from_env("CFGTEST", None).unwrap();
        assert_eq!(settings.base_url, "http://gateway.test");
        assert_eq!(settings.retry_attempts, 5);
        assert_eq!(settings.breaker.open_timeout, Duration::from_millis(250));
        assert_eq!(settings.breaker.max_total_failures, Some(9));
        assert_eq!(settings.breaker.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        let err = GatewaySettings::from_env("CFGTEST_MISSING", None).unwrap_err();
        assert!(err.to_string().contains("CFGTEST_MISSING_API_BASE_URL"));
    }
}
