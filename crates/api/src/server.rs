use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use extract::TextCompleter;
use index::CypherExecutor;
use query::{ChatHistory, ChatTurn, GraphQaChain};

pub struct AppState<C, G> {
    chain: GraphQaChain<C, G>,
    history: Mutex<ChatHistory>,
}

impl<C, G> AppState<C, G> {
    pub fn new(chain: GraphQaChain<C, G>) -> Self {
        Self {
            chain,
            history: Mutex::new(ChatHistory::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub cypher: Option<String>,
    pub error: bool,
    pub history: Vec<ChatTurn>,
}

#[derive(Serialize)]
struct HealthResponse {
    neo4j: String,
}

pub fn router<C, G>(state: Arc<AppState<C, G>>) -> Router
where
    C: TextCompleter + 'static,
    G: CypherExecutor + 'static,
{
    Router::new()
        .route("/health", get(health_check::<C, G>))
        .route("/history", get(get_history::<C, G>))
        .route("/chat", post(chat::<C, G>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check<C, G>(State(state): State<Arc<AppState<C, G>>>) -> Json<HealthResponse>
where
    C: TextCompleter,
    G: CypherExecutor,
{
    let neo4j = match state.chain.graph().read_rows("RETURN 1 AS ok", 1).await {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {:#}", e),
    };
    Json(HealthResponse { neo4j })
}

async fn get_history<C, G>(State(state): State<Arc<AppState<C, G>>>) -> Json<Vec<ChatTurn>>
where
    C: TextCompleter,
    G: CypherExecutor,
{
    let history = state.history.lock().await;
    Json(history.turns().to_vec())
}

/// Upstream failures still answer 200: the error text becomes the
/// assistant's turn, as a chat user would see it.
async fn chat<C, G>(
    State(state): State<Arc<AppState<C, G>>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode>
where
    C: TextCompleter,
    G: CypherExecutor,
{
    let question = req.question.trim();
    if question.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let outcome = state.chain.ask(question).await;
    if let Err(e) = &outcome {
        tracing::warn!(question, "Question failed: {:#}", e);
    }

    let mut history = state.history.lock().await;
    history.record_exchange(question, &outcome);

    let (answer, cypher) = match outcome {
        Ok(qa) => (qa.answer, Some(qa.cypher)),
        Err(e) => (format!("{:#}", e), None),
    };

    Ok(Json(ChatResponse {
        error: cypher.is_none(),
        answer,
        cypher,
        history: history.turns().to_vec(),
    }))
}
