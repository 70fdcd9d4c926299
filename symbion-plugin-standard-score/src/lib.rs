//! Symbion standard score plugin - peer-relative scoring of one host metric
//!
//! Reports how far a host's latest value for a metric sits from the values of
//! its peers (hosts sharing the same Mackerel service and role):
//! - peer discovery and batched retrieval against the Mackerel API
//! - population mean / deviation across the peers
//! - standard score `(value - mean) / deviation * 10 + 50`
//! - output for the mackerel-agent plugin protocol or a one-shot print

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod harness;
pub mod mackerel;
pub mod plugin;
pub mod stats;

pub use config::PluginConfig;
pub use error::PluginError;
pub use fetch::{FetchPolicy, FetchStatus, MetricFetcher};
pub use mackerel::{MackerelClient, MonitoringApi};
pub use plugin::{ScoreReport, StandardScorePlugin};
