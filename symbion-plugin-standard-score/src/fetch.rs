//! Peer discovery and batched retrieval of latest metric values
//!
//! Discovery returns every "working" host of the service that carries one of
//! the roles. Latest values are requested 50 hosts at a time and merged into a
//! single map keyed by host id (chunks never share a host, so merging is a plain
//! extend).
//!
//! Failures are handled according to [`FetchPolicy`]: best-effort logs and keeps
//! going with whatever came back, fail-fast stops at the first error. Both report
//! a [`FetchStatus`] so callers can tell a clean result from a partial one.

use crate::error::{PluginError, Result};
use crate::mackerel::{ApiError, FindHostsParam, Host, LatestMetricValues, MonitoringApi, STATUS_WORKING};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Upper bound on host ids per latest-values request
pub const HOST_CHUNK_SIZE: usize = 50;

/// What to do when a remote call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Log and continue with partial or empty data
    #[default]
    BestEffort,
    /// Abort the run on the first failure
    FailFast,
}

/// Overall outcome of a fetch stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Complete,
    Partial,
    Failed,
}

/// A remote call that failed under the best-effort policy
#[derive(Debug)]
pub struct FetchFailure {
    /// Chunk index for latest-value requests, `None` for discovery
    pub chunk: Option<usize>,
    pub error: ApiError,
}

/// Data gathered by a stage plus the calls that failed along the way
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: T,
    pub failures: Vec<FetchFailure>,
    attempts: usize,
}

impl<T> Fetched<T> {
    fn new(value: T, attempts: usize, failures: Vec<FetchFailure>) -> Self {
        Self { value, failures, attempts }
    }

    pub fn status(&self) -> FetchStatus {
        if self.failures.is_empty() {
            FetchStatus::Complete
        } else if self.failures.len() >= self.attempts {
            FetchStatus::Failed
        } else {
            FetchStatus::Partial
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Split hosts into request-sized batches, preserving order
pub fn host_chunks(hosts: &[Host]) -> std::slice::Chunks<'_, Host> {
    hosts.chunks(HOST_CHUNK_SIZE)
}

pub fn host_ids(hosts: &[Host]) -> Vec<String> {
    hosts.iter().map(|h| h.id.clone()).collect()
}

/// Runs discovery and retrieval against one API handle
pub struct MetricFetcher<'a, A> {
    api: &'a A,
    policy: FetchPolicy,
}

impl<'a, A: MonitoringApi> MetricFetcher<'a, A> {
    pub fn new(api: &'a A, policy: FetchPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Working hosts of `service` with any of `roles`
    pub async fn fetch_hosts(&self, service: &str, roles: &[String]) -> Result<Fetched<Vec<Host>>> {
        let param = FindHostsParam {
            service: service.to_string(),
            roles: roles.to_vec(),
            statuses: vec![STATUS_WORKING.to_string()],
        };

        match self.api.find_hosts(&param).await {
            Ok(hosts) => {
                info!("Discovered {} peer hosts (service={}, roles={:?})", hosts.len(), service, roles);
                Ok(Fetched::new(hosts, 1, Vec::new()))
            }
            Err(e) => match self.policy {
                FetchPolicy::FailFast => Err(PluginError::Discovery(e)),
                FetchPolicy::BestEffort => {
                    warn!("Host discovery failed, continuing without peers: {}", e);
                    Ok(Fetched::new(Vec::new(), 1, vec![FetchFailure { chunk: None, error: e }]))
                }
            },
        }
    }

    /// Latest values of `metric_names` for every host, one request per chunk
    pub async fn fetch_latest_metric_values(
        &self,
        hosts: &[Host],
        metric_names: &[String],
    ) -> Result<Fetched<LatestMetricValues>> {
        let mut merged = LatestMetricValues::new();
        let mut failures = Vec::new();
        let mut attempts = 0;

        for (index, chunk) in host_chunks(hosts).enumerate() {
            attempts += 1;
            let ids = host_ids(chunk);
            debug!("Fetching chunk {} ({} hosts)", index, ids.len());

            match self.api.fetch_latest_metric_values(&ids, metric_names).await {
                Ok(values) => merged.extend(values),
                Err(e) => match self.policy {
                    FetchPolicy::FailFast => return Err(PluginError::Fetch { chunk: index, source: e }),
                    FetchPolicy::BestEffort => {
                        warn!("Metric fetch failed for chunk {} ({} hosts): {}", index, ids.len(), e);
                        failures.push(FetchFailure { chunk: Some(index), error: e });
                    }
                },
            }
        }

        Ok(Fetched::new(merged, attempts, failures))
    }
}
