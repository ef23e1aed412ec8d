use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ingest::{DocumentKind, SourceDocument, list_documents, source_tag};

use crate::error::PipelineError;
use crate::llm::TextCompleter;
use crate::output::{self, OutputFormat};
use crate::schema::DocumentRecordSet;
use crate::Extractor;

#[derive(Debug, Clone, Serialize)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub csv_chunk_rows: usize,
    pub output_format: OutputFormat,
}

/// Lifecycle of one input document within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Reading,
    Extracting { chunk: usize, of: usize },
    Validating { chunk: usize, of: usize },
    Persisted,
    Failed,
}

impl DocumentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Reading => write!(f, "reading"),
            Self::Extracting { chunk, of } => write!(f, "extracting {}/{}", chunk + 1, of),
            Self::Validating { chunk, of } => write!(f, "validating {}/{}", chunk + 1, of),
            Self::Persisted => write!(f, "persisted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub source_tag: String,
    pub state: DocumentState,
    pub chunks: usize,
    pub records: usize,
    /// Chunks whose extraction or validation call failed.
    pub degraded_chunks: usize,
    pub outputs: Vec<PathBuf>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn persisted(&self) -> usize {
        self.count(DocumentState::Persisted)
    }

    pub fn failed(&self) -> usize {
        self.count(DocumentState::Failed)
    }

    pub fn total_records(&self) -> usize {
        self.documents.iter().map(|d| d.records).sum()
    }

    fn count(&self, state: DocumentState) -> usize {
        self.documents.iter().filter(|d| d.state == state).count()
    }
}

/// Tracks one document's state and logs every transition.
struct Progress {
    outcome: DocumentOutcome,
}

impl Progress {
    fn new(path: &Path) -> Self {
        Self {
            outcome: DocumentOutcome {
                path: path.to_path_buf(),
                source_tag: source_tag(path),
                state: DocumentState::Pending,
                chunks: 0,
                records: 0,
                degraded_chunks: 0,
                outputs: Vec::new(),
                error: None,
            },
        }
    }

    fn enter(&mut self, state: DocumentState) {
        debug_assert!(!self.outcome.state.is_terminal());
        tracing::debug!(
            document = %self.outcome.path.display(),
            from = %self.outcome.state,
            to = %state,
            "Document state change"
        );
        self.outcome.state = state;
    }

    fn fail(mut self, error: PipelineError) -> DocumentOutcome {
        tracing::error!(
            document = %self.outcome.path.display(),
            state = %self.outcome.state,
            severity = ?error.severity(),
            error = %error,
            "Skipping document"
        );
        self.outcome.error = Some(error.to_string());
        self.outcome.state = DocumentState::Failed;
        self.outcome
    }
}

/// Output file stems handed out so far in one run, compared
/// case-insensitively.
#[derive(Default)]
struct OutputNames {
    claimed: HashMap<String, PathBuf>,
}

impl OutputNames {
    /// The source tag, or `<tag>_<kind>` when another document already took
    /// the tag. A clash on both names fails the later document.
    fn claim(&mut self, path: &Path) -> Result<String, PipelineError> {
        let tag = source_tag(path);
        let mut candidates = vec![tag.clone()];
        if let Some(kind) = DocumentKind::from_path(path) {
            candidates.push(format!("{}_{}", tag, kind.label().to_ascii_lowercase()));
        }

        for stem in candidates {
            let key = stem.to_lowercase();
            if !self.claimed.contains_key(&key) {
                if stem != tag {
                    tracing::warn!(
                        document = %path.display(),
                        tag = %tag,
                        output = %stem,
                        "Output name already taken, using a kind suffix"
                    );
                }
                self.claimed.insert(key, path.to_path_buf());
                return Ok(stem);
            }
        }

        let claimed_by = self
            .claimed
            .get(&tag.to_lowercase())
            .cloned()
            .unwrap_or_default();
        Err(PipelineError::OutputClash {
            path: path.to_path_buf(),
            stem: tag,
            claimed_by,
        })
    }
}

/// Walks the input folder one document at a time.
pub struct BatchDriver<C> {
    extractor: Extractor<C>,
    options: BatchOptions,
}

impl<C: TextCompleter> BatchDriver<C> {
    pub fn new(extractor: Extractor<C>, options: BatchOptions) -> Self {
        Self { extractor, options }
    }

    pub fn extractor(&self) -> &Extractor<C> {
        &self.extractor
    }

    /// Process every document. Only an unreadable input folder or an
    /// uncreatable output folder fails the run; document failures are
    /// recorded in the report.
    pub async fn run(&self) -> Result<BatchReport, PipelineError> {
        let documents = list_documents(&self.options.input_dir)
            .await
            .map_err(|source| PipelineError::InputFolder {
                path: self.options.input_dir.clone(),
                source,
            })?;

        tokio::fs::create_dir_all(&self.options.output_dir)
            .await
            .map_err(|source| PipelineError::OutputFolder {
                path: self.options.output_dir.clone(),
                source,
            })?;

        tracing::info!(
            input = %self.options.input_dir.display(),
            documents = documents.len(),
            "Starting batch"
        );

        let mut report = BatchReport::default();
        let mut names = OutputNames::default();
        for path in &documents {
            let outcome = match names.claim(path) {
                Ok(stem) => self.process_into(path, &stem).await,
                Err(e) => Progress::new(path).fail(e),
            };
            report.documents.push(outcome);
        }

        tracing::info!(
            persisted = report.persisted(),
            failed = report.failed(),
            records = report.total_records(),
            "Batch finished"
        );
        Ok(report)
    }

    /// Run one document to a terminal state, writing under its source tag.
    pub async fn process_document(&self, path: &Path) -> DocumentOutcome {
        self.process_into(path, &source_tag(path)).await
    }

    async fn process_into(&self, path: &Path, file_stem: &str) -> DocumentOutcome {
        let mut progress = Progress::new(path);
        tracing::info!(document = %path.display(), "Processing document");

        progress.enter(DocumentState::Reading);
        let document = match SourceDocument::open(path, self.options.csv_chunk_rows).await {
            Ok(document) => document,
            Err(e) => return progress.fail(e.into()),
        };

        let count = document.chunk_count();
        progress.outcome.chunks = count;
        let mut set = DocumentRecordSet::new(progress.outcome.source_tag.clone());

        for index in 0..count {
            progress.enter(DocumentState::Extracting { chunk: index, of: count });
            let chunk = match document.chunk(index) {
                Ok(chunk) => chunk,
                Err(e) => return progress.fail(e.into()),
            };
            tracing::info!(
                document = %path.display(),
                kind = chunk.kind.label(),
                "Extracting {}",
                chunk.describe()
            );

            let records = match self.extractor.extraction_pass(&chunk, set.source_tag()).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(document = %path.display(), chunk = index, error = %e, "Extraction call failed");
                    progress.outcome.degraded_chunks += 1;
                    continue;
                }
            };

            let records = if self.extractor.validates() && !records.is_empty() {
                progress.enter(DocumentState::Validating { chunk: index, of: count });
                match self
                    .extractor
                    .validation_pass(chunk.kind, &records, set.source_tag())
                    .await
                {
                    Ok(validated) => validated,
                    Err(e) => {
                        tracing::error!(document = %path.display(), chunk = index, error = %e, "Validation call failed");
                        progress.outcome.degraded_chunks += 1;
                        continue;
                    }
                }
            } else {
                records
            };

            set.append(records);
        }

        progress.outcome.records = set.len();
        let persisted =
            output::persist(set, &self.options.output_dir, file_stem, self.options.output_format)
                .await;
        match persisted {
            Ok(outputs) => {
                progress.enter(DocumentState::Persisted);
                tracing::info!(
                    document = %path.display(),
                    records = progress.outcome.records,
                    outputs = ?outputs,
                    "Document persisted"
                );
                progress.outcome.outputs = outputs;
                progress.outcome
            }
            Err(e) => progress.fail(e),
        }
    }
}
