//! Progress credentials and the SSE event stream.
//!
//! A credential is scoped to exactly one run's channel and the four fixed
//! topics; the stream endpoint validates the token against the channel in
//! the path, so a token for one run cannot read another's events. Events
//! are hints — the stream replays nothing, and late joiners reconcile from
//! `GET /v1/runs/{id}`.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use uuid::Uuid;

use recast_core::models::run_channel;

use crate::error::ApiError;
use crate::handlers::runs::require_service_key;
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
}

pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<TokenResponse>, ApiError> {
    require_service_key(&state, &headers)?;

    // The run must exist; ownership proof happened upstream.
    state
        .runs
        .get(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("Run not found: {}", id)))?;

    let token = state.tokens.issue(&run_channel(id))?;
    Ok(Json(TokenResponse {
        token,
        expires_in: state.tokens.ttl_secs(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub token: String,
}

pub async fn event_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let channel = run_channel(id);
    let grant = state
        .tokens
        .verify(&query.token, &channel)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    let mut subscription = state.progress.subscribe(&grant.channel, grant.topics);
    tracing::info!(run_id = %id, "Progress subscriber connected");

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }
                event = subscription.next() => {
                    match event {
                        Some(event) => {
                            match Event::default()
                                .event(event.topic.to_string())
                                .json_data(&event)
                            {
                                Ok(sse_event) => yield Ok(sse_event),
                                Err(e) => {
                                    tracing::warn!(error = %e, "Failed to serialize progress event");
                                }
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("keep-alive"),
    ))
}
