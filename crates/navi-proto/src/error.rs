//! Error taxonomy shared by the catalog client, the audio engine adapter and
//! configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the remote catalog.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    /// Transport-level failure: DNS, connect, TLS, HTTP status, bad body.
    #[error("network failure: {0}")]
    Network(String),
    /// The server answered but refused the request.
    #[error("server rejected request ({code}): {message}")]
    Server { code: i64, message: String },
    /// No playable URL could be produced for the track.
    #[error("could not resolve play url for {id}: {reason}")]
    Resolution { id: String, reason: String },
    /// URL resolution did not finish within the allotted time.
    #[error("resolving play url for {id} timed out after {timeout_ms}ms")]
    ResolutionTimeout { id: String, timeout_ms: u128 },
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Failures surfaced while driving the audio engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The engine task panicked or otherwise died mid-operation.
    #[error("audio engine fault: {0}")]
    Fault(String),
    #[error("audio engine did not answer {operation} within {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u128,
    },
    #[error("audio engine is not connected")]
    Disconnected,
    /// The engine answered with an error for a specific command.
    #[error("audio engine rejected {command}: {reason}")]
    Command { command: String, reason: String },
}

/// Startup configuration problems.  All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (looked in: {})", format_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
