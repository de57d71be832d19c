use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// OpenAPI document served at `/docs` and printed by `openapi-generator`.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::join::join,
        crate::routes::play::game_state,
        crate::routes::play::submit_answer,
        crate::routes::play::submit_unlock,
        crate::routes::sse::team_stream,
        crate::routes::admin::list_games,
        crate::routes::admin::create_game,
        crate::routes::admin::get_game,
        crate::routes::admin::update_status,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::join::JoinRequest,
            crate::dto::join::JoinResponse,
            crate::dto::play::AnswerRequest,
            crate::dto::play::AnswerResponse,
            crate::dto::play::UnlockRequest,
            crate::dto::play::UnlockResponse,
            crate::dto::play::GameStateResponse,
            crate::dto::sse::TeamEvent,
            crate::dto::sse::Handshake,
            crate::dto::admin::CreateGameRequest,
            crate::dto::admin::UpdateStatusRequest,
            crate::dto::admin::GameDetail,
            crate::dto::admin::GameListItem,
        )
    ),
    modifiers(&SessionTokenAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Joining a team and playing through the stages"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Game management guarded by the admin token"),
    )
)]
pub struct ApiDoc;

struct SessionTokenAuth;

impl Modify for SessionTokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
