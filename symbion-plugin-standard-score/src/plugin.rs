//! Standard score plugin
//!
//! One run: discover the peers, fetch their latest value for the metric,
//! compute the peer mean / population deviation (the target host included),
//! then score the target's own value against it.

use crate::config::PluginConfig;
use crate::error::{PluginError, Result};
use crate::fetch::{FetchStatus, MetricFetcher};
use crate::mackerel::{Host, LatestMetricValues, MonitoringApi};
use crate::stats::PeerStatistics;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Name of the single metric the plugin reports
pub const SCORE_METRIC: &str = "standard_score";

/// metric name -> value, as handed to the output harness
pub type MetricMap = BTreeMap<String, f64>;

/// graph name -> graph, as announced to the agent
pub type GraphDefinition = BTreeMap<String, Graph>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<GraphMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphMetric {
    pub name: String,
    pub label: String,
    pub stacked: bool,
}

/// Everything computed during a run
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub node_id: String,
    pub value: f64,
    pub peers: PeerStatistics,
    pub score: f64,
    pub discovery: FetchStatus,
    pub retrieval: FetchStatus,
}

pub struct StandardScorePlugin<'a, A> {
    api: &'a A,
    config: PluginConfig,
}

impl<'a, A: MonitoringApi> StandardScorePlugin<'a, A> {
    pub fn new(api: &'a A, config: PluginConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// `<prefix>.<metric name>`, graph name and key prefix of emitted values
    pub fn graph_name(&self) -> String {
        format!("{}.{}", self.config.prefix, self.config.metric_name)
    }

    /// Single-entry map `{"standard_score": score}`
    pub async fn fetch_metrics(&self) -> Result<MetricMap> {
        let report = self.standard_score().await?;
        Ok(MetricMap::from([(SCORE_METRIC.to_string(), report.score)]))
    }

    pub fn graph_definition(&self) -> GraphDefinition {
        let name = self.graph_name();
        let graph = Graph {
            label: title_case(&name),
            unit: "float".to_string(),
            metrics: vec![GraphMetric {
                name: SCORE_METRIC.to_string(),
                label: "StandardScore".to_string(),
                stacked: false,
            }],
        };
        GraphDefinition::from([(name, graph)])
    }

    /// Run discovery, retrieval and scoring for the configured metric
    pub async fn standard_score(&self) -> Result<ScoreReport> {
        let metric = &self.config.metric_name;
        let fetcher = MetricFetcher::new(self.api, self.config.policy);

        let hosts = fetcher.fetch_hosts(&self.config.service, &self.config.roles).await?;
        let values = fetcher
            .fetch_latest_metric_values(&hosts.value, std::slice::from_ref(metric))
            .await?;

        let peer_values = collect_peer_values(&values.value, metric);
        let peers = PeerStatistics::from_values(&peer_values);
        debug!("Peer statistics for {}: {:?}", metric, peers);

        let node_id = node_id_by_name(&hosts.value, &self.config.node_name);
        let value = target_value(&values.value, &node_id, &self.config.node_name, metric)?;

        let score = peers.score(value);
        if !score.is_finite() {
            warn!(
                "Standard score of {} is not finite ({}): peer deviation is {} over {} values",
                self.config.node_name, score, peers.std_dev, peers.count
            );
        }
        info!("{} {} = {} -> standard score {}", self.config.node_name, metric, value, score);

        Ok(ScoreReport {
            node_id,
            value,
            peers,
            score,
            discovery: hosts.status(),
            retrieval: values.status(),
        })
    }
}

/// Numeric values of `metric` across all hosts. Hosts reporting `null` are
/// skipped; non-numeric values are skipped with a warning.
pub fn collect_peer_values(values: &LatestMetricValues, metric: &str) -> Vec<f64> {
    let mut peer_values = Vec::with_capacity(values.len());
    for (host_id, metrics) in values {
        let Some(Some(sample)) = metrics.get(metric) else {
            continue;
        };
        if sample.value.is_null() {
            continue;
        }
        match sample.as_f64() {
            Some(v) => peer_values.push(v),
            None => warn!("Ignoring non-numeric {} on host {}: {}", metric, host_id, sample.value),
        }
    }
    peer_values
}

/// Id of the host named `name`; the last match wins, empty when none matches
pub fn node_id_by_name(hosts: &[Host], name: &str) -> String {
    hosts
        .iter()
        .rev()
        .find(|h| h.name == name)
        .map(|h| h.id.clone())
        .unwrap_or_default()
}

fn target_value(values: &LatestMetricValues, node_id: &str, node_name: &str, metric: &str) -> Result<f64> {
    let sample = values
        .get(node_id)
        .and_then(|m| m.get(metric))
        .and_then(|s| s.as_ref())
        .filter(|s| !s.value.is_null())
        .ok_or_else(|| PluginError::MissingValue {
            host: node_name.to_string(),
            metric: metric.to_string(),
        })?;

    sample.as_f64().ok_or_else(|| PluginError::NonNumericValue {
        host: node_name.to_string(),
        metric: metric.to_string(),
        value: sample.value.clone(),
    })
}

/// Upper-case every letter that starts a word. Word boundaries are any ASCII
/// character other than letters, digits and `_`, plus whitespace.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_boundary = true;
    for c in s.chars() {
        if at_boundary {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = is_word_separator(c);
    }
    out
}

fn is_word_separator(c: char) -> bool {
    if c.is_ascii() {
        return !(c.is_ascii_alphanumeric() || c == '_');
    }
    if c.is_alphabetic() || c.is_numeric() {
        return false;
    }
    c.is_whitespace()
}
