use std::fmt::Display;

use thiserror::Error;
use tracing::warn;

pub type ExitResult<T> = Result<T, ExitError>;

#[derive(Error, Debug)]
pub enum ExitError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Exit '{0}' has no resolvable destination")]
    UnresolvableExit(String),

    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("History API refused the operation: {0}")]
    HistoryApi(String),

    #[error("Tracking sink error: {0}")]
    TrackingSink(String),

    #[error("Secondary tab was blocked: {0}")]
    TabBlocked(String),

    #[error("Environment probe failed: {0}")]
    Probe(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Run a best-effort operation. Failures are logged and discarded so that
/// no tracking or environment defect can block navigation.
pub fn attempt<T, E, F>(operation: &str, f: F) -> Option<T>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    match f() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation, error = %e, "best-effort operation failed");
            None
        }
    }
}
