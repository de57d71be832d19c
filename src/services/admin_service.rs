//! Business logic behind the admin REST routes: creating games from an inline
//! scenario snapshot, inspecting them and driving their lifecycle.

use std::{collections::HashSet, convert::Infallible, time::SystemTime};

use rand::{Rng, distr::Alphanumeric, rng};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        documents::ModifyError,
        game_store::GameStore,
        migration::CURRENT_SCHEMA_VERSION,
        models::{GameEntity, TeamEntity},
        storage::StorageError,
    },
    dto::{
        admin::{CreateGameRequest, GameDetail, GameListItem},
        sse::TeamEvent,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::{Game, GameMode, GameStatus},
        lifecycle,
    },
};

const TOKEN_SUFFIX_LEN: usize = 4;
const TOKEN_SLUG_MAX: usize = 20;
const TOKEN_ATTEMPTS: usize = 8;

/// List every stored game ordered by creation.
pub async fn list_games(state: &SharedState) -> Result<Vec<GameListItem>, ServiceError> {
    let store = state.require_game_store().await?;
    let games = store.list_games().await?;
    Ok(games.into_iter().map(GameListItem::from).collect())
}

/// Organiser view of one game.
pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameDetail, ServiceError> {
    let store = state.require_game_store().await?;
    let game = state.documents().load(store.as_ref(), id).await?;
    let status = lifecycle::effective_status(&game, SystemTime::now());
    Ok(GameDetail::build(game, status))
}

/// Lower-case slug of a team name used as the readable part of its join tokens.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= TOKEN_SLUG_MAX {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "team".to_owned()
    } else {
        slug.to_owned()
    }
}

fn random_suffix() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

/// Pick a token of the form `<slug>-<suffix>` unused both in this game and in storage.
async fn unique_token(
    store: &dyn GameStore,
    prefix: &str,
    taken: &mut HashSet<String>,
) -> Result<String, ServiceError> {
    for _ in 0..TOKEN_ATTEMPTS {
        let candidate = format!("{prefix}-{}", random_suffix());
        if taken.contains(&candidate) {
            continue;
        }
        if store.find_game_by_token(candidate.clone()).await?.is_none() {
            taken.insert(candidate.clone());
            return Ok(candidate);
        }
        debug!(token = %candidate, "join token already in use; retrying");
    }
    Err(ServiceError::Internal(format!(
        "could not allocate a unique join token for `{prefix}`"
    )))
}

/// Create a draft game from an inline scenario snapshot.
///
/// Teams receive generated join tokens, supervisor tokens when the game is
/// supervised and a team secret in math puzzle games.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameDetail, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let mode = GameMode::parse(request.mode.trim(), request.has_questions)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_game_store().await?;
    let mut taken = HashSet::new();
    let mut teams = Vec::with_capacity(request.teams.len());
    for team in request.teams {
        let slug = slugify(&team.name);
        let join_token = unique_token(store.as_ref(), &slug, &mut taken).await?;
        let supervisor_token = if request.supervised {
            Some(unique_token(store.as_ref(), &format!("{slug}-staff"), &mut taken).await?)
        } else {
            None
        };
        let team_secret =
            (mode == GameMode::MathPuzzle).then(|| rng().random_range(10..100_i64));
        teams.push(TeamEntity {
            id: Uuid::new_v4(),
            name: team.name.trim().to_owned(),
            join_token,
            supervisor_token,
            team_secret,
            unlocked_stages: Vec::new(),
            players: Vec::new(),
            results: Vec::new(),
        });
    }

    let now = SystemTime::now();
    let entity = GameEntity {
        id: Uuid::new_v4(),
        schema_version: CURRENT_SCHEMA_VERSION,
        revision: 0,
        name: request.name.trim().to_owned(),
        status: GameStatus::Draft.as_str().to_owned(),
        mode: mode.as_str().to_owned(),
        has_questions: mode.has_questions(),
        supervised: request.supervised,
        timer_enabled: Some(request.timer_minutes.is_some()),
        timer_minutes: request.timer_minutes,
        stage_timer_minutes: request.stage_timer_minutes,
        started_at: None,
        ended_at: None,
        created_at: now,
        updated_at: now,
        stages: request
            .stages
            .into_iter()
            .zip(1u32..)
            .map(|(stage, number)| stage.into_entity(number))
            .collect(),
        teams,
    };

    let game = Game::try_from(entity).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    state
        .documents()
        .create(store.as_ref(), game.clone())
        .await
        .map_err(|err| match ServiceError::from(err) {
            ServiceError::Storage(StorageError::Duplicate { kind, key }) => {
                ServiceError::Conflict(format!("{kind} `{key}` already exists"))
            }
            other => other,
        })?;

    info!(
        game_id = %game.id,
        mode = game.mode.as_str(),
        stages = game.total_stages(),
        teams = game.teams.len(),
        "game created"
    );
    Ok(GameDetail::build(game, GameStatus::Draft))
}

/// Apply an explicit status change and notify every team of the game.
pub async fn update_status(
    state: &SharedState,
    id: Uuid,
    status: GameStatus,
) -> Result<GameDetail, ServiceError> {
    let store = state.require_game_store().await?;
    let now = SystemTime::now();

    let mut game = state
        .documents()
        .modify(store.as_ref(), id, |game| {
            lifecycle::apply_status_change(game, status, now);
            Ok::<_, Infallible>(game.clone())
        })
        .await
        .map_err(|err| match err {
            ModifyError::Document(err) => ServiceError::from(err),
            ModifyError::Rejected(never) => match never {},
        })?;
    // The snapshot was taken before the write bumped the revision.
    game.revision += 1;

    for team_id in game.teams.keys() {
        state.publish(TeamEvent::game_status(game.id, *team_id, status));
    }
    info!(game_id = %id, status = status.as_str(), "game status changed");

    let effective = lifecycle::effective_status(&game, now);
    Ok(GameDetail::build(game, effective))
}
