use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, put},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::admin::{CreateGameRequest, GameDetail, GameListItem, UpdateStatusRequest},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Organiser endpoints guarded by the static admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/games", get(list_games).post(create_game))
        .route("/admin/games/{id}", get(get_game))
        .route("/admin/games/{id}/status", put(update_status))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Retrieve all games known to the system.
#[utoipa::path(
    get,
    path = "/admin/games",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Static admin token from the configuration")),
    responses((status = 200, description = "List available games", body = [GameListItem]))
)]
pub async fn list_games(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GameListItem>>, AppError> {
    Ok(Json(admin_service::list_games(&state).await?))
}

/// Create a draft game from an inline scenario snapshot.
#[utoipa::path(
    post,
    path = "/admin/games",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Static admin token from the configuration")),
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created with generated team tokens", body = GameDetail),
        (status = 400, description = "Invalid scenario for the selected mode")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameDetail>), AppError> {
    let game = admin_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Retrieve a game with its tokens, answers and team progress.
#[utoipa::path(
    get,
    path = "/admin/games/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Static admin token from the configuration"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Game detail", body = GameDetail),
        (status = 404, description = "Game not found")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameDetail>, AppError> {
    Ok(Json(admin_service::get_game(&state, id).await?))
}

/// Move a game to another lifecycle status.
#[utoipa::path(
    put,
    path = "/admin/games/{id}/status",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Static admin token from the configuration"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = GameDetail),
        (status = 404, description = "Game not found")
    )
)]
pub async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<GameDetail>, AppError> {
    Ok(Json(
        admin_service::update_status(&state, id, payload.status).await?,
    ))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().admin_token.as_deref() {
        Some(expected) if expected == provided => Ok(next.run(req).await),
        Some(_) => {
            warn!("rejected admin request with a wrong token");
            Err(AppError::Forbidden("invalid admin token".into()))
        }
        None => Err(AppError::Forbidden("admin API is disabled".into())),
    }
}
