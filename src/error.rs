//! Error taxonomy for a post-generation run.
//!
//! Each variant belongs to one of two groups. Recoverable errors
//! ([`PostError::NotFound`], [`PostError::DataUnavailable`],
//! [`PostError::ResourceFetch`]) are logged and swallowed where they occur.
//! Everything else aborts the run with a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No unclaimed item in {0}")]
    NotFound(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Generation failed after {attempts} attempts (last error: {last_error})")]
    GenerationFailure { attempts: usize, last_error: String },

    #[error("Failed to fetch resource {url}: {reason}")]
    ResourceFetch { url: String, reason: String },

    #[error("Failed to read work-item store {path}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to rewrite work-item store {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PostError {
    /// Whether this error should end the run with a non-zero exit.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PostError::NotFound(_) | PostError::DataUnavailable(_) | PostError::ResourceFetch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors_are_not_fatal() {
        assert!(!PostError::NotFound("ideas.csv".into()).is_fatal());
        assert!(!PostError::DataUnavailable("one close".into()).is_fatal());
        assert!(
            !PostError::ResourceFetch {
                url: "https://example.com".into(),
                reason: "404".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_generation_and_persistence_are_fatal() {
        let gen_err = PostError::GenerationFailure {
            attempts: 3,
            last_error: "timeout".into(),
        };
        assert!(gen_err.is_fatal());
        assert!(gen_err.to_string().contains("3 attempts"));

        let persist = PostError::Persistence {
            path: PathBuf::from("ideas.csv"),
            reason: "read-only".into(),
        };
        assert!(persist.is_fatal());
        assert!(PostError::Configuration("missing key".into()).is_fatal());
    }
}
