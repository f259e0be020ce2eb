// error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read chromaticity table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Chromaticity table is missing column `{0}`")]
    MissingColumn(&'static str),
    #[error("Malformed value `{value}` in column `{column}` on line {line}")]
    Malformed {
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("Chromaticity table has no usable rows")]
    NoRows,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Chromaticity table is empty")]
pub struct EmptyTableError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Bridge request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Bridge rejected update for light {id}: {description}")]
    Bridge { id: String, description: String },
    #[error("No fixture could be reached")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected feed response status {0}")]
    Unexpected(reqwest::StatusCode),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Sequence controller is no longer running")]
pub struct ChannelClosed;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("Invalid `{field}`: {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: std::time::TryFromFloatSecsError,
    },
}
