//! Metric source backed by the Prometheus HTTP API.
//!
//! The source issues one instantaneous query per tick, wrapping the
//! configured metric in `scalar(...)` so the backend always answers with a
//! single sample. Anything other than a clean scalar result - an error
//! status, attached warnings, a vector or matrix result - is treated as
//! fatal, since a value we cannot fully trust must not drive a scaling
//! action.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

/// Result type alias for metric queries
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while querying the monitoring backend
#[derive(Debug)]
pub enum QueryError {
    /// The request itself failed (connect, timeout, decode)
    Request(reqwest::Error),

    /// The backend rejected the query
    Backend(String),

    /// The backend attached warnings to the result
    Warnings(Vec<String>),

    /// The query evaluated to something other than a scalar
    NotScalar(String),

    /// The scalar sample could not be decoded
    Malformed(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Request(err) => write!(f, "metric query request failed: {}", err),
            QueryError::Backend(msg) => {
                write!(f, "monitoring backend rejected the query: {}", msg)
            }
            QueryError::Warnings(warnings) => {
                write!(f, "query returned warnings: {}", warnings.join(", "))
            }
            QueryError::NotScalar(kind) => {
                write!(f, "query result is not a scalar value (got {})", kind)
            }
            QueryError::Malformed(msg) => write!(f, "malformed query result: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::Request(err)
    }
}

/// Anything that can produce the current value of the watched metric
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch the current value of the configured metric.
    async fn query(&self) -> QueryResult<f64>;
}

/// Metric source querying a Prometheus-compatible backend
pub struct PrometheusSource {
    /// HTTP client (reused across requests)
    client: reqwest::Client,

    /// Base URL of the backend
    host: String,

    /// Metric evaluated inside `scalar(...)`
    metric: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,

    #[serde(default)]
    warnings: Vec<String>,

    #[serde(default)]
    error: Option<String>,

    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,

    #[serde(default)]
    result: serde_json::Value,
}

impl PrometheusSource {
    pub fn new(host: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            host: host.into(),
            metric: metric.into(),
        }
    }
}

#[async_trait]
impl MetricSource for PrometheusSource {
    async fn query(&self) -> QueryResult<f64> {
        let url = format!("{}/api/v1/query", self.host.trim_end_matches('/'));
        let expr = format!("scalar({})", self.metric);

        trace!("{url}: evaluating {expr}");

        let response = self
            .client
            .get(&url)
            .query(&[("query", expr.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Backend(format!("HTTP {}", response.status())));
        }

        let body: QueryResponse = response.json().await?;

        if body.status != "success" {
            return Err(QueryError::Backend(
                body.error
                    .unwrap_or_else(|| format!("query status {}", body.status)),
            ));
        }

        if !body.warnings.is_empty() {
            return Err(QueryError::Warnings(body.warnings));
        }

        let data = body
            .data
            .ok_or_else(|| QueryError::Malformed("response carries no data section".into()))?;

        if data.result_type != "scalar" {
            return Err(QueryError::NotScalar(data.result_type));
        }

        parse_scalar(&data.result)
    }
}

/// Decode the `[<unix time>, "<value>"]` sample pair of a scalar result.
fn parse_scalar(result: &serde_json::Value) -> QueryResult<f64> {
    let sample = result
        .get(1)
        .and_then(|value| value.as_str())
        .ok_or_else(|| QueryError::Malformed(format!("unexpected scalar payload: {result}")))?;

    sample
        .parse::<f64>()
        .map_err(|_| QueryError::Malformed(format!("scalar sample is not numeric: {sample}")))
}
