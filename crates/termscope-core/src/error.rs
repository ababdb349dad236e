//! Error taxonomy for the analysis engine.
//!
//! Every terminal error exposes an enum-style [`ErrorKind`] and a
//! human-readable reason. Reasons never carry prompt text or internal detail.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SourceKind;

/// Failures reported by the ingestion collaborator.
///
/// The engine never retries these; retry policy belongs to the ingestion layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("source kind '{0}' is not supported by this ingestion source")]
    Unsupported(SourceKind),
}

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to fetch document: {0}")]
    Fetch(#[from] FetchError),

    #[error("document is not analyzable: {reason}")]
    EmptyDocument { reason: String },

    #[error("analysis failed: {0}")]
    Analysis(String),

    /// Only raised inside the summarizer; recovered there by the fallback path.
    #[error("summarization model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("comparison needs at least {required} scored documents, got {given}")]
    InsufficientInput { given: usize, required: usize },

    #[error("comparison accepts at most {max} documents, got {given}")]
    TooManyInputs { given: usize, max: usize },
}

/// Enum-style error kind exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FetchError,
    EmptyDocumentError,
    AnalysisError,
    ModelUnavailableError,
    InsufficientInputError,
    InvalidInputError,
}

/// Serializable error report for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub reason: String,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Fetch(_) => ErrorKind::FetchError,
            EngineError::EmptyDocument { .. } => ErrorKind::EmptyDocumentError,
            EngineError::Analysis(_) => ErrorKind::AnalysisError,
            EngineError::ModelUnavailable(_) => ErrorKind::ModelUnavailableError,
            EngineError::InsufficientInput { .. } => ErrorKind::InsufficientInputError,
            EngineError::TooManyInputs { .. } => ErrorKind::InvalidInputError,
        }
    }

    /// Whether the error aborts the request it occurred in.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EngineError::ModelUnavailable(_))
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            reason: self.to_string(),
        }
    }
}
