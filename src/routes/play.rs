use axum::{
    Extension, Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};

use crate::{
    dto::play::{AnswerRequest, AnswerResponse, GameStateResponse, UnlockRequest, UnlockResponse},
    error::AppError,
    routes::auth::require_session,
    services::play_service,
    state::{SharedState, game::PlayerSession},
};

/// Gameplay endpoints, all authenticated with the player's session token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/game/state", get(game_state))
        .route("/game/answer", post(submit_answer))
        .route("/game/unlock", post(submit_unlock))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// Snapshot of the caller's team, with the game's effective status.
#[utoipa::path(
    get,
    path = "/game/state",
    tag = "game",
    security(("session_token" = [])),
    responses(
        (status = 200, description = "Current team state", body = GameStateResponse),
        (status = 401, description = "Missing or unknown session token"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn game_state(
    State(state): State<SharedState>,
    Extension(session): Extension<PlayerSession>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(play_service::game_state(&state, &session).await?))
}

/// Answer the question of the team's current stage.
#[utoipa::path(
    post,
    path = "/game/answer",
    tag = "game",
    security(("session_token" = [])),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerResponse),
        (status = 400, description = "Empty or oversized answer"),
        (status = 401, description = "Missing or unknown session token"),
        (status = 409, description = "Game inactive, stage locked, no question or all stages done")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Extension(session): Extension<PlayerSession>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(
        play_service::submit_answer(&state, &session, payload).await?,
    ))
}

/// Unlock the team's current stage with a scanned or computed code.
#[utoipa::path(
    post,
    path = "/game/unlock",
    tag = "game",
    security(("session_token" = [])),
    request_body = UnlockRequest,
    responses(
        (status = 200, description = "Stage unlocked", body = UnlockResponse),
        (status = 400, description = "Empty or non-numeric code"),
        (status = 401, description = "Missing or unknown session token"),
        (status = 403, description = "Only supervisors unlock guided stages"),
        (status = 409, description = "No unlock step, already unlocked or game inactive"),
        (status = 422, description = "Wrong code")
    )
)]
pub async fn submit_unlock(
    State(state): State<SharedState>,
    Extension(session): Extension<PlayerSession>,
    Json(payload): Json<UnlockRequest>,
) -> Result<Json<UnlockResponse>, AppError> {
    Ok(Json(
        play_service::submit_unlock(&state, &session, payload).await?,
    ))
}
