use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Mackerel node name (default: use hostname).
    #[arg(long, env = "STANDARD_SCORE_NODE")]
    pub node: Option<String>,

    /// Service name.
    #[arg(long)]
    pub service: Option<String>,

    /// Role names, comma separated.
    #[arg(long)]
    pub role: Option<String>,

    /// Metric name to score.
    #[arg(long)]
    pub metric_name: Option<String>,

    /// Print the metric once and exit instead of speaking the agent plugin protocol.
    #[arg(long)]
    pub cli_mode: bool,

    /// Abort on the first API failure instead of continuing with partial data.
    #[arg(long)]
    pub fail_fast: bool,

    /// Path to a TOML file with default settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root URL of the Mackerel API.
    #[arg(long, env = "MACKEREL_APIBASE")]
    pub api_base: Option<String>,
}
