use crate::mackerel::ApiError;

/// Errors a plugin run can end with
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Host discovery failed: {0}")]
    Discovery(#[source] ApiError),
    #[error("Metric fetch failed for chunk {chunk}: {source}")]
    Fetch {
        chunk: usize,
        #[source]
        source: ApiError,
    },
    #[error("No latest value for metric '{metric}' on host '{host}'")]
    MissingValue { host: String, metric: String },
    #[error("Metric '{metric}' on host '{host}' is not numeric: {value}")]
    NonNumericValue {
        host: String,
        metric: String,
        value: serde_json::Value,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PluginError> = std::result::Result<T, E>;
