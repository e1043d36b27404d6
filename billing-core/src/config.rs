use anyhow::{anyhow, Context};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub billing_api_url: String,
    pub catalog_api_url: String,
    pub receivables_api_url: String,
    pub security_api_url: String,
    /// Module code sent with every login, `FAC` for this console.
    pub module_id: String,
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
    pub http_timeout: Duration,
    pub reconcile_interval_seconds: u64,
}

impl Config {
    /// Loads the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or any numeric setting
    /// cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }

        Ok(Self {
            server_host: var_or("SERVER_HOST", "0.0.0.0"),
            server_port: parse_or("SERVER_PORT", 3000)?,
            billing_api_url: url_or("BILLING_API_URL", "http://localhost:8000"),
            catalog_api_url: url_or("CATALOG_API_URL", "http://localhost:8001"),
            receivables_api_url: url_or("RECEIVABLES_API_URL", "http://localhost:8002"),
            security_api_url: url_or("SECURITY_API_URL", "http://localhost:8003"),
            module_id: var_or("MODULE_ID", "FAC"),
            jwt_secret,
            session_ttl_minutes: parse_or("SESSION_TTL_MINUTES", 480)?,
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECONDS", 15)?),
            reconcile_interval_seconds: parse_or("RECONCILE_INTERVAL_SECONDS", 300)?,
        })
    }

    /// Configuration pointing every remote service at `base_url`.
    #[cfg(test)]
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            billing_api_url: base_url.to_string(),
            catalog_api_url: base_url.to_string(),
            receivables_api_url: base_url.to_string(),
            security_api_url: base_url.to_string(),
            module_id: "FAC".to_string(),
            jwt_secret: "test-secret".to_string(),
            session_ttl_minutes: 60,
            http_timeout: Duration::from_secs(5),
            reconcile_interval_seconds: 300,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn url_or(key: &str, default: &str) -> String {
    var_or(key, default).trim_end_matches('/').to_string()
}

fn parse_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        let value: u64 = parse_or("BILLING_CONFIG_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        env::set_var("BILLING_CONFIG_TEST_BAD_PORT", "not-a-port");
        let result: anyhow::Result<u16> = parse_or("BILLING_CONFIG_TEST_BAD_PORT", 3000);
        assert!(result.is_err());
    }

    #[test]
    fn test_url_or_strips_trailing_slash() {
        env::set_var("BILLING_CONFIG_TEST_URL", "http://billing.local/");
        assert_eq!(url_or("BILLING_CONFIG_TEST_URL", "x"), "http://billing.local");
    }
}
