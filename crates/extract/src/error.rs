use std::path::PathBuf;

use ingest::DocumentReadError;
use thiserror::Error;

/// Failure of a single completion-service call.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("request to {service} failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned no completion text")]
    Empty { service: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the run before any document or graph write is attempted.
    Fatal,
    /// Logged; the affected chunk or document degrades and the run goes on.
    Recoverable,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("graph store unreachable: {0}")]
    Connectivity(String),

    #[error("cannot list input folder {path:?}: {source}")]
    InputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create output folder {path:?}: {source}")]
    OutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    DocumentRead(#[from] DocumentReadError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("failed to write {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode output: {0}")]
    Encode(String),

    #[error("output name {stem:?} for {path:?} is already taken by {claimed_by:?}")]
    OutputClash {
        path: PathBuf,
        stem: String,
        claimed_by: PathBuf,
    },
}

impl PipelineError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Configuration(_)
            | Self::Connectivity(_)
            | Self::InputFolder { .. }
            | Self::OutputFolder { .. } => Severity::Fatal,
            Self::DocumentRead(_)
            | Self::Completion(_)
            | Self::Persist { .. }
            | Self::Encode(_)
            | Self::OutputClash { .. } => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
