//! Session directory: joining a team and resolving bearer tokens.

use std::{convert::Infallible, time::SystemTime};

use rand::{Rng, distr::Alphanumeric, rng};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{documents::ModifyError, game_store::GameStore, models::PlayerSessionEntity},
    dto::{
        join::{JoinRequest, JoinResponse},
        sse::TeamEvent,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::{GameStatus, Player, PlayerSession},
        lifecycle,
    },
};

/// Length of generated session tokens (about 256 bits of entropy).
pub const SESSION_TOKEN_LEN: usize = 43;

/// Why `join` did not add a player; both surface as not found.
#[derive(Debug, Error)]
enum JoinRefused {
    #[error("game is not active")]
    Inactive,
    #[error("unknown join token")]
    UnknownToken,
}

/// Random opaque token handed out at join.
pub fn generate_session_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Register a new player on the team owning `request.join_token`.
///
/// Supervisor tokens only resolve on supervised games and grant the
/// `supervisor` role.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<JoinResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_game_store().await?;
    let join_token = request.join_token.trim().to_owned();
    let player_name = request.player_name.trim().to_owned();

    let game_id = store
        .find_game_by_token(join_token.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(JoinRefused::UnknownToken.to_string()))?;

    let session_token = generate_session_token();
    let now = SystemTime::now();
    let token_for_player = session_token.clone();

    let joined = state
        .documents()
        .modify(store.as_ref(), game_id, move |game| {
            if lifecycle::effective_status(game, now) != GameStatus::Active {
                return Err(JoinRefused::Inactive);
            }
            let (team, role) = game
                .team_by_join_token_mut(&join_token)
                .ok_or(JoinRefused::UnknownToken)?;
            let player = Player::new(player_name, role, token_for_player, now);
            let player_id = player.id;
            team.players.push(player);
            Ok((team.id, team.name.clone(), player_id, role))
        })
        .await;

    let (team_id, team_name, player_id, role) = match joined {
        Ok(joined) => joined,
        Err(ModifyError::Rejected(reason)) => {
            debug!(%game_id, reason = %reason, "join refused");
            return Err(ServiceError::NotFound(reason.to_string()));
        }
        Err(ModifyError::Document(err)) => return Err(err.into()),
    };

    let stored = store
        .insert_session(PlayerSessionEntity {
            token: session_token.clone(),
            player_id,
            team_id,
            game_id,
            role: role.as_str().to_owned(),
            created_at: now,
        })
        .await;
    if let Err(err) = stored {
        warn!(%game_id, %player_id, error = %err, "session could not be stored, removing player");
        remove_player(state, store.as_ref(), game_id, team_id, player_id).await;
        return Err(err.into());
    }

    state.publish(TeamEvent::player_joined(game_id, team_id, player_id));
    info!(%game_id, %team_id, %player_id, role = role.as_str(), "player joined");

    Ok(JoinResponse {
        session_token,
        player_id,
        team_id,
        team_name,
        game_id,
        role,
    })
}

/// Take back a player whose session never made it to storage.
async fn remove_player(
    state: &SharedState,
    store: &dyn GameStore,
    game_id: Uuid,
    team_id: Uuid,
    player_id: Uuid,
) {
    let removed = state
        .documents()
        .modify(store, game_id, |game| {
            if let Some(team) = game.teams.get_mut(&team_id) {
                team.players.retain(|player| player.id != player_id);
            }
            Ok::<_, Infallible>(())
        })
        .await;
    if let Err(err) = removed {
        error!(%game_id, %player_id, error = %err, "could not remove player without session");
    }
}

/// Resolve a bearer token into the session it was issued for.
pub async fn resolve(state: &SharedState, token: &str) -> Result<PlayerSession, ServiceError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ServiceError::Unauthenticated("missing session token".into()));
    }

    let store = state.require_game_store().await?;
    let entity = store
        .find_session(token.to_owned())
        .await?
        .ok_or_else(|| ServiceError::Unauthenticated("unknown session token".into()))?;

    PlayerSession::try_from(entity)
        .map_err(|err| ServiceError::Internal(format!("stored session is invalid: {err}")))
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::memory::MemoryGameStore,
            models::{GameEntity, GameListItemEntity},
            storage::{StorageError, StorageResult},
        },
        services::seed::{self, DEMO_JOIN_TOKEN},
        state::{AppState, game::PlayerRole},
    };

    async fn seeded_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.set_game_store(Arc::new(store)).await;
        seed::seed_demo(&state).await.unwrap();
        state
    }

    fn request(token: &str, name: &str) -> JoinRequest {
        JoinRequest {
            join_token: token.into(),
            player_name: name.into(),
        }
    }

    #[test]
    fn session_tokens_are_long_and_distinct() {
        let first = generate_session_token();
        let second = generate_session_token();
        assert_eq!(first.len(), SESSION_TOKEN_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn join_then_resolve_returns_the_same_binding() {
        let state = seeded_state().await;
        let joined = join(&state, request(DEMO_JOIN_TOKEN, "Ana")).await.unwrap();
        assert_eq!(joined.role, PlayerRole::Player);

        let session = resolve(&state, &joined.session_token).await.unwrap();
        assert_eq!(session.player_id, joined.player_id);
        assert_eq!(session.team_id, joined.team_id);
        assert_eq!(session.game_id, joined.game_id);

        let store = state.require_game_store().await.unwrap();
        let game = state
            .documents()
            .load(store.as_ref(), joined.game_id)
            .await
            .unwrap();
        let team = &game.teams[&joined.team_id];
        assert_eq!(team.players.len(), 1);
        assert_eq!(team.players[0].id, joined.player_id);
    }

    #[tokio::test]
    async fn session_write_failure_leaves_no_player_behind() {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(SessionlessStore(MemoryGameStore::new())))
            .await;
        seed::seed_demo(&state).await.unwrap();

        let err = join(&state, request(DEMO_JOIN_TOKEN, "Ana")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));

        let store = state.require_game_store().await.unwrap();
        let game_id = store
            .find_game_by_token(DEMO_JOIN_TOKEN.into())
            .await
            .unwrap()
            .unwrap();
        let game = state.documents().load(store.as_ref(), game_id).await.unwrap();
        assert!(game.teams.values().all(|team| team.players.is_empty()));
    }

    #[tokio::test]
    async fn join_token_is_trimmed_before_lookup() {
        let state = seeded_state().await;
        let joined = join(&state, request(&format!("  {DEMO_JOIN_TOKEN} "), "Ana")).await;
        assert!(joined.is_ok());
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let state = seeded_state().await;
        let err = join(&state, request("nobody-knows", "Ana")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_session_is_unauthenticated() {
        let state = seeded_state().await;
        let err = resolve(&state, "not-a-session").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    /// Memory store whose session writes always fail.
    struct SessionlessStore(MemoryGameStore);

    impl GameStore for SessionlessStore {
        fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.0.insert_game(game)
        }

        fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            self.0.find_game(id)
        }

        fn replace_game(
            &self,
            game: GameEntity,
            expected_revision: u64,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.0.replace_game(game, expected_revision)
        }

        fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
            self.0.list_games()
        }

        fn find_game_by_token(
            &self,
            token: String,
        ) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
            self.0.find_game_by_token(token)
        }

        fn insert_session(
            &self,
            _session: PlayerSessionEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "session collection offline".into(),
                    io::Error::other("connection reset"),
                ))
            })
        }

        fn find_session(
            &self,
            token: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerSessionEntity>>> {
            self.0.find_session(token)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.0.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.0.try_reconnect()
        }
    }
}
