use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::join::{JoinRequest, JoinResponse},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Join a team with its player or supervisor token.
#[utoipa::path(
    post,
    path = "/join",
    tag = "game",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player registered", body = JoinResponse),
        (status = 400, description = "Invalid token format or player name"),
        (status = 404, description = "Unknown token or game not active")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(session_service::join(&state, payload).await?))
}

/// Unauthenticated `/join`.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/join", post(join))
}
