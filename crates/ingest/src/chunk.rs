use serde::{Deserialize, Serialize};
use std::path::Path;

/// The two document flavours the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Csv,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(Self::Csv),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Field delimiter the completion service is asked to use.
    ///
    /// Chemical names routinely contain commas ("1,1,1,2-Tetrachloroethane"),
    /// so the CSV flow uses `$`. The PDF flow keeps the comma.
    pub fn delimiter(self) -> char {
        match self {
            Self::Csv => '$',
            Self::Pdf => ',',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Pdf => "PDF",
        }
    }
}

/// Where a chunk sits inside its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkSpan {
    /// Half-open, zero-based row range.
    Rows { start: usize, end: usize },
    /// One-based page number out of `of` pages.
    Page { number: u32, of: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub source_document: String,
    pub chunk_index: usize,
    pub raw_text: String,
    pub kind: DocumentKind,
    pub span: ChunkSpan,
}

impl TextChunk {
    /// Short human readable location, used in log lines.
    pub fn describe(&self) -> String {
        match self.span {
            ChunkSpan::Rows { start, end } => format!("lines {}-{}", start + 1, end),
            ChunkSpan::Page { number, of } => format!("page {}/{}", number, of),
        }
    }

    /// Estimate token count (rough: 1.3 tokens per word)
    pub fn estimated_tokens(&self) -> usize {
        let word_count = self.raw_text.split_whitespace().count();
        (word_count as f64 * 1.3) as usize
    }
}
