use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentReadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported document format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse PDF {path:?}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("chunk {index} is out of range for {document} ({count} chunks)")]
    ChunkOutOfRange {
        document: String,
        index: usize,
        count: usize,
    },
}
