use axum::Router;

use crate::state::SharedState;

/// Organiser endpoints under `/admin`.
pub mod admin;
/// Bearer token middlewares.
pub mod auth;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// `/healthcheck`.
pub mod health;
/// `/join`.
pub mod join;
/// Player endpoints under `/game`.
pub mod play;
/// `/game/events` stream.
pub mod sse;

/// The full HTTP surface; middlewares that need state get it up front.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(join::router())
        .merge(play::router(state.clone()))
        .merge(sse::router())
        .merge(admin::router(state.clone()))
        .merge(docs::router())
        .with_state(state)
}
