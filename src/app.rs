//! Client for the app platform that owns the scaled service.
//!
//! The platform has no partial-patch surface: changing the instance count
//! means reading the full app specification, touching exactly one field and
//! submitting the whole document back. The spec is therefore kept as raw
//! JSON so every field we do not understand passes through untouched.
//!
//! Only the first service of the app is considered. Scaling an app with
//! several services scales that first one and leaves the rest alone.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::status::ScalingStatus;

const DEFAULT_API_BASE: &str = "https://api.digitalocean.com";

/// Result type alias for app reads
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while reading the app
#[derive(Debug)]
pub enum FetchError {
    /// The request itself failed (connect, timeout, decode)
    Request(reqwest::Error),

    /// The platform answered with a non-success status
    Status(reqwest::StatusCode),

    /// The app specification carries no services
    NoServices,

    /// The app payload misses expected fields
    Malformed(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Request(err) => write!(f, "failed to fetch the app: {}", err),
            FetchError::Status(status) => write!(f, "app request returned HTTP {}", status),
            FetchError::NoServices => write!(f, "no services found"),
            FetchError::Malformed(msg) => write!(f, "malformed app specification: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err)
    }
}

/// Errors that can occur while updating the app
#[derive(Debug)]
pub enum UpdateError {
    /// The fresh read before the update failed
    Fetch(FetchError),

    /// The update request itself failed
    Request(reqwest::Error),

    /// The platform rejected the update
    Status(reqwest::StatusCode),
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::Fetch(err) => {
                write!(f, "failed to read the app before updating: {}", err)
            }
            UpdateError::Request(err) => write!(f, "app update request failed: {}", err),
            UpdateError::Status(status) => write!(f, "app update returned HTTP {}", status),
        }
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UpdateError::Fetch(err) => Some(err),
            UpdateError::Request(err) => Some(err),
            UpdateError::Status(_) => None,
        }
    }
}

impl From<FetchError> for UpdateError {
    fn from(err: FetchError) -> Self {
        UpdateError::Fetch(err)
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        UpdateError::Request(err)
    }
}

/// A service whose instance count can be read and changed
#[async_trait]
pub trait ScalableTarget: Send + Sync {
    /// Instance count of the first service, freshly read.
    async fn current_size(&self) -> FetchResult<i64>;

    /// Set the instance count of the first service.
    async fn set_size(&self, new_size: i64) -> Result<(), UpdateError>;
}

/// `ScalableTarget` backed by the app platform's REST API
pub struct AppPlatformClient {
    /// HTTP client (reused across requests)
    client: reqwest::Client,

    api_base: String,
    token: String,
    app_id: String,

    /// Updated on every successful size read
    status: ScalingStatus,
}

impl AppPlatformClient {
    pub fn new(
        token: impl Into<String>,
        app_id: impl Into<String>,
        status: ScalingStatus,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            app_id: app_id.into(),
            status,
        }
    }

    /// Point the client at a different API base (tests, staging).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn app_url(&self) -> String {
        format!(
            "{}/v2/apps/{}",
            self.api_base.trim_end_matches('/'),
            self.app_id
        )
    }

    /// Fetch the full app specification.
    async fn fetch_spec(&self) -> FetchResult<Value> {
        let response = self
            .client
            .get(self.app_url())
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body: Value = response.json().await?;

        body.get("app")
            .and_then(|app| app.get("spec"))
            .cloned()
            .ok_or_else(|| FetchError::Malformed("response carries no app spec".into()))
    }
}

/// Instance count of the first service in the spec.
fn first_service_count(spec: &Value) -> FetchResult<i64> {
    let Some(service) = spec
        .get("services")
        .and_then(Value::as_array)
        .and_then(|services| services.first())
    else {
        return Err(FetchError::NoServices);
    };

    service
        .get("instance_count")
        .and_then(Value::as_i64)
        .ok_or_else(|| FetchError::Malformed("service carries no instance count".into()))
}

#[async_trait]
impl ScalableTarget for AppPlatformClient {
    async fn current_size(&self) -> FetchResult<i64> {
        debug!("getting current app size");

        let spec = self.fetch_spec().await?;
        let size = first_service_count(&spec)?;

        debug!("current app size: {size}");

        self.status.record(size).await;

        Ok(size)
    }

    async fn set_size(&self, new_size: i64) -> Result<(), UpdateError> {
        debug!("setting app size to {new_size}");

        let mut spec = self.fetch_spec().await?;

        // make sure services[0] exists before indexing into it
        first_service_count(&spec)?;
        spec["services"][0]["instance_count"] = json!(new_size);

        let response = self
            .client
            .put(self.app_url())
            .bearer_auth(&self.token)
            .json(&json!({ "spec": spec }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpdateError::Status(response.status()));
        }

        trace!("app update accepted");

        Ok(())
    }
}
