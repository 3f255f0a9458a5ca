//! Typed errors for the library seams.
//!
//! The binary reports through `color_eyre`; these enums exist so the
//! coordinator can classify provider failures without string matching.

use thiserror::Error;

/// Failure reported by a [`crate::provider::RunsProvider`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network hiccup, timeout, 5xx or 429. Eligible for retry.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The provider gave up (or the request can never succeed). Escalate.
    #[error("retries exhausted: {0}")]
    Exhausted(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Exhausted(msg) => msg,
        }
    }
}

/// A single malformed run record. The record is dropped; the load continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("run record has no id")]
    MissingId,
    #[error("run {0} has no status")]
    MissingStatus(u64),
    #[error("unknown run status {0:?}")]
    UnknownStatus(String),
    #[error("run {0} has no repository reference")]
    MissingRepository(u64),
    #[error("run {id} has an invalid {field} timestamp: {value:?}")]
    BadTimestamp {
        id: u64,
        field: &'static str,
        value: String,
    },
    #[error("run {id} references unknown repository {reference}")]
    UnmatchedRepository { id: u64, reference: String },
    #[error("malformed run record: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to replace {path}: {source}")]
    Rename {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}
