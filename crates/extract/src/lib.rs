pub mod batch;
pub mod error;
pub mod llm;
pub mod normalizer;
pub mod output;
pub mod parser;
pub mod prompt;
pub mod schema;
pub mod stub;

pub use batch::{BatchDriver, BatchOptions, BatchReport, DocumentOutcome, DocumentState};
pub use error::{CompletionError, PipelineError, Severity};
pub use llm::{CompletionBackend, CompletionRequest, OllamaClient, OpenAiClient, TextCompleter};
pub use output::OutputFormat;
pub use schema::{ChemicalRecord, ChemicalsDocument, DocumentRecordSet};
pub use stub::StubCompleter;

use ingest::{DocumentKind, TextChunk};

/// Runs the extraction and validation passes for one chunk at a time.
pub struct Extractor<C> {
    completer: C,
    max_tokens: u32,
    validate: bool,
}

impl<C: TextCompleter> Extractor<C> {
    pub fn new(completer: C, max_tokens: u32) -> Self {
        Self {
            completer,
            max_tokens,
            validate: true,
        }
    }

    /// Turn the second (validation) pass on or off.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn validates(&self) -> bool {
        self.validate
    }

    pub fn completer(&self) -> &C {
        &self.completer
    }

    /// First pass: ask for name/CAS pairs in the chunk text.
    pub async fn extraction_pass(
        &self,
        chunk: &TextChunk,
        source_tag: &str,
    ) -> Result<Vec<ChemicalRecord>, CompletionError> {
        tracing::debug!(
            document = %chunk.source_document,
            chunk = chunk.chunk_index,
            tokens = chunk.estimated_tokens(),
            sample = %chunk.raw_text.chars().take(50).collect::<String>(),
            "Extracting chunk"
        );

        let request = CompletionRequest::new(
            prompt::system_prompt(chunk.kind),
            prompt::build_extraction_prompt(chunk.kind, &chunk.raw_text),
            self.max_tokens,
        );
        let reply = self.completer.complete(&request).await?;

        Ok(parser::parse_response(&reply, chunk.kind.delimiter(), source_tag))
    }

    /// Second pass: send the parsed pairs back for splitting and gap filling.
    ///
    /// The reply replaces `records` wholesale. Split output is final; it is
    /// not validated again.
    pub async fn validation_pass(
        &self,
        kind: DocumentKind,
        records: &[ChemicalRecord],
        source_tag: &str,
    ) -> Result<Vec<ChemicalRecord>, CompletionError> {
        let delimiter = kind.delimiter();
        let request = CompletionRequest::new(
            prompt::system_prompt(kind),
            prompt::build_validation_prompt(kind, &parser::serialize_records(records, delimiter)),
            self.max_tokens,
        );
        let reply = self.completer.complete(&request).await?;

        let validated = parser::parse_response(&reply, delimiter, source_tag);
        tracing::debug!(
            source_tag,
            before = records.len(),
            after = validated.len(),
            "Validation pass done"
        );
        Ok(validated)
    }
}
