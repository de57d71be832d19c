use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    routes::auth::bearer_token,
    services::{session_service, sse_service},
    state::SharedState,
};

/// Browsers cannot set headers on `EventSource`, so the token travels in the query.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Session token; the `Authorization` header is used when absent.
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/game/events",
    tag = "sse",
    params(EventsQuery),
    responses(
        (status = 200, description = "Team event stream: a `handshake` frame, then `state` frames", content_type = "text/event-stream", body = String),
        (status = 401, description = "Missing or unknown session token")
    )
)]
/// Stream change notifications for the caller's team.
pub async fn team_stream(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let token = query
        .token
        .as_deref()
        .filter(|token| !token.trim().is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| AppError::Unauthorized("missing session token".into()))?;

    let session = session_service::resolve(&state, token).await?;
    let (subscription, handshake) = sse_service::subscribe_team(&state, &session).await;
    Ok(sse_service::to_sse_stream(
        subscription,
        handshake,
        state.config().keep_alive,
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/game/events", get(team_stream))
}
