//! Plugin configuration
//!
//! Settings come from, in order of precedence:
//! - command line flags (some with environment fallbacks, see [`CliArgs`])
//! - an optional TOML file given with `--config`
//! - built-in defaults (local hostname, public Mackerel API, best-effort fetch)
//!
//! The API key is never stored here; it is read from `MACKEREL_APIKEY` by
//! [`api_key_from_env`] when the client is built.

use crate::cli::CliArgs;
use crate::error::{PluginError, Result};
use crate::fetch::FetchPolicy;
use crate::harness::OutputMode;
use crate::mackerel::{API_KEY_ENV, DEFAULT_API_BASE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Prefix of the graph name and metric keys
pub const DEFAULT_PREFIX: &str = "standard_score";

/// Optional settings file, every key may be omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub node: Option<String>,
    pub service: Option<String>,
    /// Comma separated, like the `--role` flag
    pub role: Option<String>,
    pub metric_name: Option<String>,
    pub api_base: Option<String>,
    pub fail_fast: Option<bool>,
}

impl FileConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    pub prefix: String,
    /// Name of the host whose metric is scored
    pub node_name: String,
    pub service: String,
    pub roles: Vec<String>,
    pub metric_name: String,
    pub api_base: String,
    pub policy: FetchPolicy,
    pub mode: OutputMode,
}

impl PluginConfig {
    /// Merge flags, the optional file and defaults
    pub async fn resolve(args: CliArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path).await?,
            None => FileConfig::default(),
        };
        Self::merge(args, file, local_hostname)
    }

    fn merge(args: CliArgs, file: FileConfig, hostname: impl FnOnce() -> Result<String>) -> Result<Self> {
        let node_name = match args.node.or(file.node).filter(|n| !n.is_empty()) {
            Some(node) => node,
            None => hostname()?,
        };

        let metric_name = args.metric_name.or(file.metric_name).unwrap_or_default();
        if metric_name.is_empty() {
            return Err(PluginError::Config("a metric name is required (--metric-name)".into()));
        }

        let role = args.role.or(file.role).unwrap_or_default();
        let policy = if args.fail_fast || file.fail_fast.unwrap_or(false) {
            FetchPolicy::FailFast
        } else {
            FetchPolicy::BestEffort
        };

        Ok(Self {
            prefix: DEFAULT_PREFIX.to_string(),
            node_name,
            service: args.service.or(file.service).unwrap_or_default(),
            roles: parse_roles(&role),
            metric_name,
            api_base: args
                .api_base
                .or(file.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            policy,
            mode: if args.cli_mode { OutputMode::OneShot } else { OutputMode::Harness },
        })
    }
}

/// Split a comma separated role list. An empty string gives one empty role,
/// which the API receives as-is.
pub fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',').map(String::from).collect()
}

fn local_hostname() -> Result<String> {
    let name = hostname::get()?;
    Ok(name.to_string_lossy().to_string())
}

/// API key from the environment; empty (and every call unauthorized) when unset
pub fn api_key_from_env() -> String {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => key,
        _ => {
            warn!("{} is not set, API calls will be rejected", API_KEY_ENV);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["symbion-plugin-standard-score"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    fn fixed_host() -> Result<String> {
        Ok("this-box".to_string())
    }

    #[test]
    fn test_parse_roles() {
        assert_eq!(parse_roles("web,db"), vec!["web", "db"]);
        assert_eq!(parse_roles("web"), vec!["web"]);
        assert_eq!(parse_roles(""), vec![""]);
        assert_eq!(parse_roles("web,,db"), vec!["web", "", "db"]);
    }

    #[test]
    fn test_defaults() {
        let config = PluginConfig::merge(args(&["--metric-name", "cpu"]), FileConfig::default(), fixed_host).unwrap();

        assert_eq!(config.prefix, "standard_score");
        assert_eq!(config.node_name, "this-box");
        assert_eq!(config.service, "");
        assert_eq!(config.roles, vec![""]);
        assert_eq!(config.policy, FetchPolicy::BestEffort);
        assert_eq!(config.mode, OutputMode::Harness);
    }

    #[test]
    fn test_empty_node_falls_back_to_hostname() {
        let config = PluginConfig::merge(
            args(&["--node", "", "--metric-name", "cpu"]),
            FileConfig::default(),
            fixed_host,
        )
        .unwrap();
        assert_eq!(config.node_name, "this-box");
    }

    #[test]
    fn test_missing_metric_name() {
        let err = PluginConfig::merge(args(&["--service", "shop"]), FileConfig::default(), fixed_host).unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig {
            node: Some("file-node".into()),
            service: Some("file-service".into()),
            role: Some("batch".into()),
            metric_name: Some("memory.used".into()),
            api_base: Some("http://mackerel.internal".into()),
            fail_fast: Some(true),
        };
        let config = PluginConfig::merge(
            args(&["--service", "shop", "--role", "web,db", "--cli-mode"]),
            file,
            fixed_host,
        )
        .unwrap();

        assert_eq!(config.node_name, "file-node");
        assert_eq!(config.service, "shop");
        assert_eq!(config.roles, vec!["web", "db"]);
        assert_eq!(config.metric_name, "memory.used");
        assert_eq!(config.api_base, "http://mackerel.internal");
        assert_eq!(config.policy, FetchPolicy::FailFast);
        assert_eq!(config.mode, OutputMode::OneShot);
    }

    #[tokio::test]
    async fn test_resolve_reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
node = "web-02"
service = "shop"
role = "web"
metric_name = "loadavg5"
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = PluginConfig::resolve(args(&["--config", &path, "--fail-fast"])).await.unwrap();

        assert_eq!(config.node_name, "web-02");
        assert_eq!(config.service, "shop");
        assert_eq!(config.roles, vec!["web"]);
        assert_eq!(config.metric_name, "loadavg5");
        assert_eq!(config.policy, FetchPolicy::FailFast);
    }

    #[tokio::test]
    async fn test_invalid_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service = [not toml").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let err = PluginConfig::resolve(args(&["--config", &path])).await.unwrap_err();
        assert!(matches!(err, PluginError::ConfigFile(_)));
    }
}
