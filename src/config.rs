use anyhow::{Context, Result, anyhow, bail};
use tracing::warn;

const PROMETHEUS_HOST: &str = "PROMETHEUS_HOST";
const PROMETHEUS_METRIC: &str = "PROMETHEUS_METRIC";
const THRESHOLD_UP: &str = "THRESHOLD_UP";
const THRESHOLD_DOWN: &str = "THRESHOLD_DOWN";
const MAX_SIZE: &str = "MAX_SIZE";
const DO_API_TOKEN: &str = "DO_API_TOKEN";
const DO_APP_ID: &str = "DO_APP_ID";
const BIND_PORT: &str = "BIND_PORT";

const DEFAULT_BIND_PORT: u16 = 8080;

/// Immutable runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Prometheus instance to query
    pub prometheus_host: String,

    /// Metric (or expression) evaluated inside `scalar(...)`
    pub prometheus_metric: String,

    /// Scale up once the metric rises above this value
    pub threshold_up: f64,

    /// Scale down once the metric falls below this value
    pub threshold_down: f64,

    /// Upper bound for the instance count
    pub max_size: i64,

    /// API token for the app platform
    pub api_token: String,

    /// ID of the app to scale
    pub app_id: String,

    /// Port the status reporter binds to
    pub bind_port: u16,
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// Every missing or unparsable required variable is an error; the caller
    /// is expected to treat that as fatal.
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} is required"));

        let threshold_up = required(THRESHOLD_UP)?
            .parse::<f64>()
            .with_context(|| format!("{THRESHOLD_UP} must be a floating point number"))?;

        let threshold_down = required(THRESHOLD_DOWN)?
            .parse::<f64>()
            .with_context(|| format!("{THRESHOLD_DOWN} must be a floating point number"))?;

        let max_size = required(MAX_SIZE)?
            .parse::<i64>()
            .with_context(|| format!("{MAX_SIZE} must be an integer"))?;

        if max_size < 1 {
            bail!("{MAX_SIZE} must be at least 1");
        }

        if threshold_down >= threshold_up {
            // the up branch wins when both thresholds would match
            warn!(
                "{THRESHOLD_DOWN} ({threshold_down}) is not below {THRESHOLD_UP} ({threshold_up})"
            );
        }

        let bind_port = match lookup(BIND_PORT) {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("{BIND_PORT} must be a valid port number"))?,
            None => DEFAULT_BIND_PORT,
        };

        Ok(Config {
            prometheus_host: required(PROMETHEUS_HOST)?,
            prometheus_metric: required(PROMETHEUS_METRIC)?,
            threshold_up,
            threshold_down,
            max_size,
            api_token: required(DO_API_TOKEN)?,
            app_id: required(DO_APP_ID)?,
            bind_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (PROMETHEUS_HOST, "http://prometheus:9090"),
            (PROMETHEUS_METRIC, "active_jobs"),
            (THRESHOLD_UP, "80"),
            (THRESHOLD_DOWN, "20"),
            (MAX_SIZE, "5"),
            (DO_API_TOKEN, "token"),
            (DO_APP_ID, "app-id"),
        ])
    }

    fn load(env: &HashMap<&str, &str>) -> Result<Config> {
        Config::from_lookup(&|key| env.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn loads_complete_environment() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.prometheus_host, "http://prometheus:9090");
        assert_eq!(config.prometheus_metric, "active_jobs");
        assert_eq!(config.threshold_up, 80.0);
        assert_eq!(config.threshold_down, 20.0);
        assert_eq!(config.max_size, 5);
        assert_eq!(config.bind_port, DEFAULT_BIND_PORT);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let mut env = base_env();
        env.remove(PROMETHEUS_HOST);

        let err = load(&env).unwrap_err();
        assert_eq!(err.to_string(), "PROMETHEUS_HOST is required");
    }

    #[test]
    fn unparsable_threshold_is_an_error() {
        let mut env = base_env();
        env.insert(THRESHOLD_UP, "eighty");

        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("THRESHOLD_UP"));
    }

    #[test]
    fn unparsable_max_size_is_an_error() {
        let mut env = base_env();
        env.insert(MAX_SIZE, "many");

        assert!(load(&env).is_err());
    }

    #[test]
    fn max_size_below_one_is_an_error() {
        let mut env = base_env();
        env.insert(MAX_SIZE, "0");

        assert!(load(&env).is_err());
    }

    #[test]
    fn bind_port_is_optional() {
        let mut env = base_env();
        env.insert(BIND_PORT, "9999");

        assert_eq!(load(&env).unwrap().bind_port, 9999);
    }

    #[test]
    fn unparsable_bind_port_is_an_error() {
        let mut env = base_env();
        env.insert(BIND_PORT, "not-a-port");

        assert!(load(&env).is_err());
    }

    #[test]
    fn inverted_thresholds_are_accepted() {
        let mut env = base_env();
        env.insert(THRESHOLD_UP, "20");
        env.insert(THRESHOLD_DOWN, "80");

        assert!(load(&env).is_ok());
    }
}
