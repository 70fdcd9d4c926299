//! Output of a plugin run
//!
//! Two modes:
//! - one-shot (`--cli-mode`): print the metric map once, for humans
//! - agent plugin: one `key\tvalue\tepoch` line per metric, or the graph
//!   definition block when the agent sets `MACKEREL_AGENT_PLUGIN_META`
//!
//! Polling is the agent's business; every invocation emits exactly once.

use crate::error::Result;
use crate::mackerel::MonitoringApi;
use crate::plugin::{GraphDefinition, MetricMap, StandardScorePlugin};
use std::io::Write;
use tracing::warn;

pub const PLUGIN_META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";
pub const META_HEADER: &str = "# mackerel-agent-plugin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Speak the agent plugin protocol
    #[default]
    Harness,
    /// Print the metric map once
    OneShot,
}

/// True when the agent asks for graph definitions instead of values
pub fn meta_requested() -> bool {
    std::env::var(PLUGIN_META_ENV).map(|v| !v.is_empty()).unwrap_or(false)
}

/// `{"standard_score": 50.0}`
pub fn format_one_shot(metrics: &MetricMap) -> String {
    format!("{:?}", metrics)
}

/// Agent plugin lines for `metrics`, keyed `<key_prefix>.<name>`.
/// NaN and infinities cannot be graphed and are dropped.
pub fn format_metric_lines(key_prefix: &str, metrics: &MetricMap, epoch: i64) -> Vec<String> {
    metrics
        .iter()
        .filter_map(|(name, value)| {
            let key = format!("{key_prefix}.{name}");
            if !value.is_finite() {
                warn!("Invalid value: key = {}, value = {}", key, value);
                return None;
            }
            Some(format!("{key}\t{value:.6}\t{epoch}"))
        })
        .collect()
}

/// Header line followed by `{"graphs": {...}}`
pub fn format_meta(graphs: &GraphDefinition) -> serde_json::Result<String> {
    let body = serde_json::to_string(&serde_json::json!({ "graphs": graphs }))?;
    Ok(format!("{META_HEADER}\n{body}"))
}

/// Run the plugin once and write its output in the configured mode
pub async fn emit<A, W>(plugin: &StandardScorePlugin<'_, A>, meta: bool, out: &mut W) -> Result<()>
where
    A: MonitoringApi,
    W: Write,
{
    match plugin.config().mode {
        OutputMode::OneShot => {
            let metrics = plugin.fetch_metrics().await?;
            writeln!(out, "{}", format_one_shot(&metrics))?;
        }
        OutputMode::Harness if meta => {
            let meta = format_meta(&plugin.graph_definition()).map_err(std::io::Error::from)?;
            writeln!(out, "{meta}")?;
        }
        OutputMode::Harness => {
            let metrics = plugin.fetch_metrics().await?;
            let epoch = chrono::Utc::now().timestamp();
            for line in format_metric_lines(&plugin.graph_name(), &metrics, epoch) {
                writeln!(out, "{line}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
