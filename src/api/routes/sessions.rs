use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::api::{routes::ApiError, state::AppState};
use crate::application::ChatEvent;
use crate::domain::{ChatSession, Message, TravelPreferences};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub preferences: TravelPreferences,
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let session = state.chat.start_session().await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatSession>, ApiError> {
    Ok(Json(state.chat.session(id).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.chat.end_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.chat.clear_history(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Message>, ApiError> {
    let reply = state
        .chat
        .reply(id, &request.message, &request.preferences)
        .await?;
    Ok(Json(reply))
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let events = state
        .chat
        .stream_reply(id, &request.message, &request.preferences)
        .await?;

    let stream = events.map(|event| Ok::<_, Infallible>(sse_event(event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(event: ChatEvent) -> Event {
    let (name, message) = match event {
        ChatEvent::Delta(text) => {
            // SSE data lines may not contain carriage returns.
            return Event::default().event("delta").data(text.replace('\r', ""));
        }
        ChatEvent::Done(message) => ("done", message),
        ChatEvent::Failed(message) => ("error", message),
    };

    Event::default()
        .event(name)
        .json_data(&message)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
