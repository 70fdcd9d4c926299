//! Mackerel API client
//!
//! Only the two endpoints the plugin relies on:
//! - host search by service / role / status (`GET /api/v0/hosts`)
//! - latest metric values for a batch of hosts (`GET /api/v0/tsdb/latest`)
//!
//! The client is an explicit handle built once per run and passed by reference
//! to whatever needs remote access. Code that only needs the two calls is written
//! against [`MonitoringApi`] so tests can point it at a stub server.

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.mackerelio.com";
pub const API_KEY_ENV: &str = "MACKEREL_APIKEY";

/// Status of hosts eligible as peers
pub const STATUS_WORKING: &str = "working";

/// Errors raised by the API client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Host record as returned by `/api/v0/hosts`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub status: String,
    /// service name -> role names
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub is_retired: bool,
}

/// Filter for host search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindHostsParam {
    pub service: String,
    pub roles: Vec<String>,
    pub statuses: Vec<String>,
}

impl FindHostsParam {
    /// Query pairs in the order the API expects. Every role is sent, even an
    /// empty one; the service is omitted when empty.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(1 + self.roles.len() + self.statuses.len());
        if !self.service.is_empty() {
            pairs.push(("service", self.service.as_str()));
        }
        pairs.extend(self.roles.iter().map(|r| ("role", r.as_str())));
        pairs.extend(self.statuses.iter().map(|s| ("status", s.as_str())));
        pairs
    }
}

/// One latest sample for a (host, metric) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricValue {
    /// Epoch seconds
    pub time: i64,
    /// Loosely typed on the wire; see [`MetricValue::as_f64`]
    #[serde(default)]
    pub value: serde_json::Value,
}

impl MetricValue {
    /// Checked coercion of the wire value. `None` for null, strings, objects...
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

/// host id -> metric name -> latest sample (null when the host has no data)
pub type LatestMetricValues = HashMap<String, HashMap<String, Option<MetricValue>>>;

/// Remote monitoring service as seen by the plugin
#[allow(async_fn_in_trait)]
pub trait MonitoringApi {
    async fn find_hosts(&self, param: &FindHostsParam) -> Result<Vec<Host>, ApiError>;

    async fn fetch_latest_metric_values(
        &self,
        host_ids: &[String],
        metric_names: &[String],
    ) -> Result<LatestMetricValues, ApiError>;
}

#[derive(Debug, Deserialize)]
struct HostsResponse {
    hosts: Vec<Host>,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    tseries: LatestMetricValues,
}

/// reqwest-backed Mackerel client
#[derive(Clone)]
pub struct MackerelClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for MackerelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key
        f.debug_struct("MackerelClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl MackerelClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: parsed,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}{path}: {e}", self.base_url)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!("GET {} ({} query params)", url, query.len());

        let response = self
            .http
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                message: error_message(&body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl MonitoringApi for MackerelClient {
    async fn find_hosts(&self, param: &FindHostsParam) -> Result<Vec<Host>, ApiError> {
        let response: HostsResponse = self.get_json("/api/v0/hosts", &param.query_pairs()).await?;
        Ok(response.hosts)
    }

    async fn fetch_latest_metric_values(
        &self,
        host_ids: &[String],
        metric_names: &[String],
    ) -> Result<LatestMetricValues, ApiError> {
        let query: Vec<(&str, &str)> = host_ids
            .iter()
            .map(|id| ("hostId", id.as_str()))
            .chain(metric_names.iter().map(|n| ("name", n.as_str())))
            .collect();

        let response: LatestResponse = self.get_json("/api/v0/tsdb/latest", &query).await?;
        Ok(response.tseries)
    }
}

/// Extract a readable message from an error body.
/// Mackerel answers `{"error": {"message": "..."}}`, older endpoints `{"error": "..."}`.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| match &v["error"] {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(o) => o.get("message").and_then(|m| m.as_str()).map(String::from),
        _ => None,
    });
    message.unwrap_or_else(|| body.trim().to_string())
}
