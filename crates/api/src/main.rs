use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

use extract::{BatchDriver, Extractor, PipelineError};
use index::GraphLoader;
use query::GraphQaChain;

mod config;
mod server;
mod telemetry;

use config::{CompletionConfig, ExtractionConfig, GraphConfig};

/// Extract chemical names and CAS numbers from regulatory documents and
/// load them into a queryable graph
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn every CSV and PDF in INPUT_FOLDER into a chemicals file
    Extract,

    /// Load every chemicals file in JSON_OUTPUT_FOLDER into Neo4j
    Load,

    /// Answer one question against the graph
    Ask {
        /// Question in plain language
        question: String,
    },

    /// Serve the chat endpoints over HTTP
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Exit status for a setup failure that stopped the run before any work.
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _telemetry = match telemetry::init(config::log_file_from_env().as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let status = exit_status(&e);
            if status == EXIT_FATAL {
                tracing::error!("Stopped before processing: {:#}", e);
            } else {
                tracing::error!("{:#}", e);
            }
            ExitCode::from(status)
        }
    }
}

/// Fatal pipeline errors (configuration, connectivity, folders) exit with
/// `EXIT_FATAL`; anything else with 1.
fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<PipelineError>() {
        Some(e) if e.is_fatal() => EXIT_FATAL,
        _ => 1,
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Extract => extract_documents().await,
        Command::Load => load_graph().await,
        Command::Ask { question } => ask(&question).await,
        Command::Serve { bind } => serve(bind).await,
    }
}

async fn extract_documents() -> Result<()> {
    let completion = CompletionConfig::from_env().map_err(PipelineError::from)?;
    let extraction = ExtractionConfig::from_env().map_err(PipelineError::from)?;

    let client = completion.client();
    tracing::info!(
        backend = %client.describe(),
        config = %serde_json::to_string(&extraction)?,
        "Starting extraction"
    );

    let extractor = Extractor::new(client, completion.max_tokens)
        .with_validation(extraction.validation_pass);
    let driver = BatchDriver::new(extractor, extraction.batch_options());
    let report = driver.run().await?;

    tracing::info!(
        documents = report.documents.len(),
        persisted = report.persisted(),
        failed = report.failed(),
        records = report.total_records(),
        "Extraction finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn load_graph() -> Result<()> {
    let folder = config::json_folder_from_env().map_err(PipelineError::from)?;
    let graph_config = GraphConfig::from_env().map_err(PipelineError::from)?;

    let loader = GraphLoader::new(graph_config.connect().await?);
    let report = loader.load_directory(&folder).await?;
    let stats = loader.graph().stats().await?;

    tracing::info!(
        files = report.files_loaded,
        failed = report.files_failed.len(),
        upserted = report.stats.upserted,
        chemicals = stats.chemicals,
        chemical_names = stats.chemical_names,
        regulations = stats.regulations,
        relationships = stats.relationships,
        "Load finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn qa_chain() -> Result<GraphQaChain<extract::CompletionBackend, index::ChemicalGraph>> {
    let completion = CompletionConfig::from_env().map_err(PipelineError::from)?;
    let graph_config = GraphConfig::from_env().map_err(PipelineError::from)?;
    let graph = graph_config.connect().await?;

    Ok(GraphQaChain::new(completion.client(), graph)
        .with_top_k(graph_config.qa_top_k)
        .with_max_tokens(completion.max_tokens))
}

async fn ask(question: &str) -> Result<()> {
    let chain = qa_chain().await?;
    let answer = chain.ask(question).await?;

    tracing::info!(cypher = %answer.cypher, rows = answer.rows, "Answered");
    println!("{}", answer.answer);
    Ok(())
}

async fn serve(bind: Option<String>) -> Result<()> {
    let chain = qa_chain().await?;
    let app = server::router(Arc::new(server::AppState::new(chain)));

    let addr = bind.unwrap_or_else(config::bind_addr_from_env);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
