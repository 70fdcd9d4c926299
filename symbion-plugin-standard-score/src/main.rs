//! Symbion Standard Score Plugin
//!
//! Invoked by mackerel-agent on every polling cycle (or by hand with
//! `--cli-mode`); computes the standard score once and exits.

use anyhow::{Context, Result};
use clap::Parser;
use symbion_plugin_standard_score::cli::CliArgs;
use symbion_plugin_standard_score::config::{api_key_from_env, PluginConfig};
use symbion_plugin_standard_score::harness;
use symbion_plugin_standard_score::{MackerelClient, StandardScorePlugin};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    // stdout belongs to the agent, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();
    let config = PluginConfig::resolve(args)
        .await
        .context("Failed to resolve configuration")?;
    debug!("Resolved configuration: {:?}", config);

    let client = MackerelClient::with_base_url(api_key_from_env(), &config.api_base)
        .context("Failed to create Mackerel client")?;
    let plugin = StandardScorePlugin::new(&client, config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    harness::emit(&plugin, harness::meta_requested(), &mut out)
        .await
        .with_context(|| format!("Failed to fetch {} standard score", plugin.config().metric_name))?;

    Ok(())
}
