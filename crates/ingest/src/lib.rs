pub mod chunk;
pub mod chunker;
pub mod error;
pub mod reader;

pub use chunk::{ChunkSpan, DocumentKind, TextChunk};
pub use chunker::RowChunker;
pub use error::DocumentReadError;
pub use reader::{SourceDocument, list_documents};

use std::path::Path;

/// Derive the regulation tag for a document from its file name.
///
/// The extension is dropped, `+` and spaces become `_`, commas vanish.
pub fn source_tag(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.replace('+', "_").replace(',', "").replace(' ', "_")
}
