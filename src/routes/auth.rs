use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{error::AppError, services::session_service, state::SharedState};

/// Token carried by an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the bearer session and expose it to handlers as an extension.
pub async fn require_session(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?
        .to_owned();

    let session = session_service::resolve(&state, &token).await?;
    debug!(player_id = %session.player_id, team_id = %session.team_id, "session resolved");
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
