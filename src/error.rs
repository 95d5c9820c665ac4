use std::path::PathBuf;

use thiserror::Error;

/// Transport-level failure reported by a source client after its retries are spent.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {attempts} attempts")]
    Timeout { url: String, attempts: u32 },
    #[error("request to {url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing {field} in {context}")]
    MissingField { context: String, field: String },
    #[error("unexpected shape in {context}: {detail}")]
    Shape { context: String, detail: String },
}

impl ParseError {
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        ParseError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn shape(context: impl Into<String>, detail: impl Into<String>) -> Self {
        ParseError::Shape {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

/// Anything a collaborator can fail with while producing one document.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
