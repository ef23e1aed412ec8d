use anyhow::{Context, Result};
use serde::Serialize;

use extract::{CompletionRequest, TextCompleter};
use index::{CypherExecutor, GRAPH_SCHEMA};

use crate::cypher::{ensure_read_only, strip_code_fences};

pub const DEFAULT_TOP_K: usize = 200;

const SYSTEM_PROMPT: &str =
    "You are an assistant that answers questions about a graph of chemicals and the regulations that list them.";

#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub question: String,
    pub cypher: String,
    pub rows: usize,
    pub answer: String,
}

impl AsRef<str> for QaAnswer {
    fn as_ref(&self) -> &str {
        &self.answer
    }
}

/// Question → Cypher → rows → answer.
pub struct GraphQaChain<C, G> {
    completer: C,
    graph: G,
    top_k: usize,
    max_tokens: u32,
}

impl<C: TextCompleter, G: CypherExecutor> GraphQaChain<C, G> {
    pub fn new(completer: C, graph: G) -> Self {
        Self {
            completer,
            graph,
            top_k: DEFAULT_TOP_K,
            max_tokens: 4000,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub async fn ask(&self, question: &str) -> Result<QaAnswer> {
        let cypher = self.generate_cypher(question).await?;
        ensure_read_only(&cypher)?;
        tracing::info!(%cypher, "Generated Cypher");

        let rows = self
            .graph
            .read_rows(&cypher, self.top_k)
            .await
            .with_context(|| format!("Failed to run generated Cypher: {}", cypher))?;
        tracing::debug!(rows = rows.len(), "Cypher returned");

        let answer = self.generate_answer(question, &rows).await?;

        Ok(QaAnswer {
            question: question.to_string(),
            cypher,
            rows: rows.len(),
            answer,
        })
    }

    async fn generate_cypher(&self, question: &str) -> Result<String> {
        let request = CompletionRequest::new(
            SYSTEM_PROMPT.to_string(),
            build_cypher_prompt(question),
            self.max_tokens,
        )
        .with_temperature(0.0);

        let reply = self
            .completer
            .complete(&request)
            .await
            .context("Failed to generate Cypher")?;
        Ok(strip_code_fences(&reply))
    }

    async fn generate_answer(&self, question: &str, rows: &[serde_json::Value]) -> Result<String> {
        let context = serde_json::to_string_pretty(rows)?;
        let request = CompletionRequest::new(
            SYSTEM_PROMPT.to_string(),
            build_answer_prompt(question, &context),
            self.max_tokens,
        )
        .with_temperature(0.0);

        let answer = self
            .completer
            .complete(&request)
            .await
            .context("Failed to generate answer")?;
        Ok(answer.trim().to_string())
    }
}

fn build_cypher_prompt(question: &str) -> String {
    format!(
        r#"Task: Generate a Cypher statement to query a graph database.

Instructions:
- Use only the node labels, relationship types and properties in the schema.
- Chemical names are stored on ChemicalName nodes, CAS numbers on Chemical nodes.
- Write a read-only query. Never create, merge, set, delete or remove anything.
- Answer with the Cypher statement only, without explanations or apologies.

Schema:
{}

The question is:
{}"#,
        GRAPH_SCHEMA, question
    )
}

fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are an assistant that helps to form nice and human understandable answers.
The information part contains the provided information that you must use to construct an answer.
The provided information is authoritative, you must never doubt it or try to use your internal knowledge to correct it.
Make the answer sound as a response to the question. Do not mention that you based the result on the given information.
If the provided information is empty, say that you don't know the answer.

Information:
{}

Question: {}
Helpful Answer:"#,
        context, question
    )
}
