use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use cheatcode_core::Turn;
use cheatcode_core::session::SessionId;
use cheatcode_index::store::ScoredChunk;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::server::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Serialize)]
pub(crate) struct SourceMetadata {
    pub source: String,
    pub chunk_index: usize,
}

#[derive(Serialize)]
pub(crate) struct SourceDocument {
    pub page_content: String,
    pub metadata: SourceMetadata,
    pub score: f32,
}

impl From<ScoredChunk> for SourceDocument {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            page_content: scored.chunk.content,
            metadata: SourceMetadata {
                source: scored.chunk.source_path,
                chunk_index: scored.chunk.chunk_index,
            },
            score: scored.score,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ChatResponse {
    pub answer: String,
    pub session_id: SessionId,
    pub source_documents: Vec<SourceDocument>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
}

pub(crate) async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let history = match request.session_id {
        Some(id) => state.sessions.history(id).await?,
        None => Vec::new(),
    };

    let result = state.chain.ask(question, &history).await?;

    // A new session is only opened once there is a turn to record.
    let session_id = match request.session_id {
        Some(id) => id,
        None => state.sessions.create().await,
    };

    if let Err(e) = state
        .sessions
        .append_turn(session_id, Turn::new(question, result.answer.clone()))
        .await
    {
        tracing::debug!("turn not recorded: {e}");
    }

    Ok(Json(ChatResponse {
        answer: result.answer,
        session_id,
        source_documents: result.sources.into_iter().map(Into::into).collect(),
    }))
}

pub(crate) async fn close_session_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> StatusCode {
    if state.sessions.close(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions: state.sessions.len().await,
    })
}
