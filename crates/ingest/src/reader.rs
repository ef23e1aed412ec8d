use std::path::{Path, PathBuf};

use lopdf::Document;
use tokio::fs;

use crate::chunk::{ChunkSpan, DocumentKind, TextChunk};
use crate::chunker::RowChunker;
use crate::error::DocumentReadError;

/// An opened input document that hands out chunks by index.
pub enum SourceDocument {
    Csv(CsvDocument),
    Pdf(PdfDocument),
}

pub struct CsvDocument {
    name: String,
    rows: Vec<String>,
    chunker: RowChunker,
}

pub struct PdfDocument {
    path: PathBuf,
    name: String,
    document: Document,
    /// One-based page numbers in page order.
    pages: Vec<u32>,
}

impl SourceDocument {
    /// Open `path`, picking the reader from its extension.
    pub async fn open(path: &Path, rows_per_chunk: usize) -> Result<Self, DocumentReadError> {
        match DocumentKind::from_path(path) {
            Some(DocumentKind::Csv) => CsvDocument::open(path, RowChunker::new(rows_per_chunk))
                .await
                .map(Self::Csv),
            Some(DocumentKind::Pdf) => PdfDocument::open(path).await.map(Self::Pdf),
            None => Err(DocumentReadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Csv(_) => DocumentKind::Csv,
            Self::Pdf(_) => DocumentKind::Pdf,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Csv(doc) => &doc.name,
            Self::Pdf(doc) => &doc.name,
        }
    }

    pub fn chunk_count(&self) -> usize {
        match self {
            Self::Csv(doc) => doc.chunker.chunk_count(doc.rows.len()),
            Self::Pdf(doc) => doc.pages.len(),
        }
    }

    /// Chunk `index`; any index below `chunk_count()` may be requested again.
    pub fn chunk(&self, index: usize) -> Result<TextChunk, DocumentReadError> {
        match self {
            Self::Csv(doc) => doc.chunk(index),
            Self::Pdf(doc) => doc.chunk(index),
        }
    }

    /// Lazily yields every chunk in order.
    pub fn chunks(&self) -> impl Iterator<Item = Result<TextChunk, DocumentReadError>> + '_ {
        (0..self.chunk_count()).map(move |i| self.chunk(i))
    }
}

impl CsvDocument {
    async fn open(path: &Path, chunker: RowChunker) -> Result<Self, DocumentReadError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| DocumentReadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let rows: Vec<String> = content.lines().map(str::to_string).collect();
        tracing::info!(document = %path.display(), rows = rows.len(), "Opened CSV document");

        Ok(Self {
            name: display_name(path),
            rows,
            chunker,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn chunk(&self, index: usize) -> Result<TextChunk, DocumentReadError> {
        let range = self.chunker.range(index, self.rows.len()).ok_or_else(|| {
            DocumentReadError::ChunkOutOfRange {
                document: self.name.clone(),
                index,
                count: self.chunker.chunk_count(self.rows.len()),
            }
        })?;

        Ok(TextChunk {
            source_document: self.name.clone(),
            chunk_index: index,
            raw_text: self.rows[range.clone()].join("\n"),
            kind: DocumentKind::Csv,
            span: ChunkSpan::Rows {
                start: range.start,
                end: range.end,
            },
        })
    }
}

impl PdfDocument {
    async fn open(path: &Path) -> Result<Self, DocumentReadError> {
        let bytes = fs::read(path).await.map_err(|source| DocumentReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let document = Document::load_mem(&bytes).map_err(|e| DocumentReadError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        tracing::info!(document = %path.display(), pages = pages.len(), "Opened PDF document");

        Ok(Self {
            path: path.to_path_buf(),
            name: display_name(path),
            document,
            pages,
        })
    }

    fn chunk(&self, index: usize) -> Result<TextChunk, DocumentReadError> {
        let number = *self
            .pages
            .get(index)
            .ok_or_else(|| DocumentReadError::ChunkOutOfRange {
                document: self.name.clone(),
                index,
                count: self.pages.len(),
            })?;

        let raw_text = self
            .document
            .extract_text(&[number])
            .map_err(|e| DocumentReadError::Pdf {
                path: self.path.clone(),
                message: format!("page {}: {}", number, e),
            })?;

        Ok(TextChunk {
            source_document: self.name.clone(),
            chunk_index: index,
            raw_text,
            kind: DocumentKind::Pdf,
            span: ChunkSpan::Page {
                number,
                of: self.pages.len(),
            },
        })
    }
}

/// List the `.csv` and `.pdf` files directly inside `dir`, sorted by name.
pub async fn list_documents(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if entry.file_type().await?.is_file() && DocumentKind::from_path(&path).is_some() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn write_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
        let path = dir.join(name);
        let body: Vec<String> = (0..rows).map(|i| format!("Chemical {i},{i}-00-0")).collect();
        std::fs::write(&path, body.join("\n") + "\n").unwrap();
        path
    }

    fn one_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_csv_chunks_cover_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "list.csv", 32);

        let doc = SourceDocument::open(&path, 15).await.unwrap();
        assert_eq!(doc.kind(), DocumentKind::Csv);
        assert_eq!(doc.chunk_count(), 3);

        let chunks: Vec<TextChunk> = doc.chunks().collect::<Result<_, _>>().unwrap();
        assert_eq!(chunks[0].raw_text.lines().count(), 15);
        assert_eq!(chunks[2].raw_text, "Chemical 30,30-00-0\nChemical 31,31-00-0");
        assert_eq!(chunks[2].span, ChunkSpan::Rows { start: 30, end: 32 });
        assert!(chunks.iter().enumerate().all(|(i, c)| c.chunk_index == i));

        // restartable by index
        assert_eq!(doc.chunk(1).unwrap().raw_text, chunks[1].raw_text);
    }

    #[tokio::test]
    async fn test_chunk_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "list.csv", 4);

        let doc = SourceDocument::open(&path, 15).await.unwrap();
        let err = doc.chunk(1).unwrap_err();
        assert!(matches!(err, DocumentReadError::ChunkOutOfRange { index: 1, count: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceDocument::open(&dir.path().join("absent.csv"), 15)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DocumentReadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = SourceDocument::open(&path, 15).await.err().unwrap();
        assert!(matches!(err, DocumentReadError::Pdf { .. }));
    }

    #[tokio::test]
    async fn test_pdf_page_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annex.pdf");
        std::fs::write(&path, one_page_pdf("Ethanol, 64-17-5")).unwrap();

        let doc = SourceDocument::open(&path, 15).await.unwrap();
        assert_eq!(doc.kind(), DocumentKind::Pdf);
        assert_eq!(doc.chunk_count(), 1);

        let chunk = doc.chunk(0).unwrap();
        assert!(chunk.raw_text.contains("Ethanol"));
        assert_eq!(chunk.span, ChunkSpan::Page { number: 1, of: 1 });
        assert!(doc.chunk(1).is_err());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let err = SourceDocument::open(Path::new("notes.txt"), 15).await.err().unwrap();
        assert!(matches!(err, DocumentReadError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_list_documents_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "b.csv", 1);
        write_csv(dir.path(), "a.CSV", 1);
        std::fs::write(dir.path().join("c.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = list_documents(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv", "c.pdf"]);
    }
}
