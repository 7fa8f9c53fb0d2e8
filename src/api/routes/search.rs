use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{routes::ApiError, state::AppState};
use crate::domain::{IndexSummary, SearchResult};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResultResponse {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub source: Option<String>,
    pub content: String,
    pub score: f32,
}

impl From<SearchResult> for SearchResultResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            chunk_id: result.chunk.id,
            document_id: result.chunk.document_id,
            source: result.chunk.metadata.source,
            content: result.chunk.content,
            score: result.score,
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResultResponse>>, ApiError> {
    state.index.ensure_ready().await?;
    let top_k = request.limit.unwrap_or_else(|| state.rag.default_top_k());
    let results = state.rag.retrieve_top_k(&request.query, top_k).await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

pub async fn index_summary(State(state): State<AppState>) -> Result<Json<IndexSummary>, ApiError> {
    Ok(Json(state.index.ensure_ready().await?))
}
