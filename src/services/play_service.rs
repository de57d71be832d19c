//! Gameplay operations for authenticated players: state snapshot, answers and unlocks.
//!
//! Every mutation first settles a due timer expiry, then re-checks the
//! effective status inside its own critical section so nothing is written to
//! a game that already ended.

use std::time::SystemTime;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{documents::ModifyError, game_store::GameStore},
    dto::{
        play::{
            AnswerRequest, AnswerResponse, GameStateResponse, StageView, UnlockRequest,
            UnlockResponse,
        },
        sse::TeamEvent,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::{Game, GameStatus, PlayerSession, Stage, Team},
        lifecycle::{self, GameInactive},
        progression::{self, Rejection, UnlockOutcome},
    },
};

/// Why a gameplay mutation was refused inside the game lock.
#[derive(Debug, Error)]
enum PlayRefused {
    #[error(transparent)]
    Inactive(#[from] GameInactive),
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("team not found in game")]
    UnknownTeam,
}

impl From<PlayRefused> for ServiceError {
    fn from(refused: PlayRefused) -> Self {
        match refused {
            PlayRefused::Inactive(inactive) => inactive.into(),
            PlayRefused::Rejected(rejection) => rejection.into(),
            PlayRefused::UnknownTeam => ServiceError::NotFound("team not found in game".into()),
        }
    }
}

fn into_service_error(err: ModifyError<PlayRefused>) -> ServiceError {
    match err {
        ModifyError::Document(err) => err.into(),
        ModifyError::Rejected(refused) => refused.into(),
    }
}

/// Timer already handled, or not due yet.
#[derive(Debug)]
struct NotDue;

/// Persist the `ended` status of a game whose timer ran out and tell every team.
///
/// The check is repeated inside the lock, so concurrent callers write it once.
async fn settle_expiry(
    state: &SharedState,
    store: &dyn GameStore,
    game_id: Uuid,
    now: SystemTime,
) -> Result<bool, ServiceError> {
    let settled = state
        .documents()
        .modify(store, game_id, |game| {
            if lifecycle::expire_if_due(game, now) {
                Ok(game.teams.keys().copied().collect::<Vec<_>>())
            } else {
                Err(NotDue)
            }
        })
        .await;

    match settled {
        Ok(team_ids) => {
            info!(%game_id, "game timer ran out; game ended");
            for team_id in team_ids {
                state.publish(TeamEvent::game_status(game_id, team_id, GameStatus::Ended));
            }
            Ok(true)
        }
        Err(ModifyError::Rejected(NotDue)) => Ok(false),
        Err(ModifyError::Document(err)) => Err(err.into()),
    }
}

fn team_in<'a>(game: &'a Game, team_id: Uuid) -> Result<&'a Team, ServiceError> {
    game.teams
        .get(&team_id)
        .ok_or_else(|| ServiceError::NotFound("team not found in game".into()))
}

/// Full snapshot of the caller's team.
pub async fn game_state(
    state: &SharedState,
    session: &PlayerSession,
) -> Result<GameStateResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let mut game = state
        .documents()
        .load(store.as_ref(), session.game_id)
        .await?;
    let now = SystemTime::now();

    if lifecycle::is_expired(&game, now) {
        // The snapshot reports `ended` either way; failing to persist it must not fail the read.
        if let Err(err) = settle_expiry(state, store.as_ref(), game.id, now).await {
            warn!(game_id = %game.id, error = %err, "could not persist timer expiry");
        }
        lifecycle::expire_if_due(&mut game, now);
    }

    let team = team_in(&game, session.team_id)?;
    Ok(GameStateResponse::build(
        &game,
        team,
        session.player_id,
        session.role,
        lifecycle::effective_status(&game, now),
    ))
}

/// Record an answer for the current stage of the caller's team.
pub async fn submit_answer(
    state: &SharedState,
    session: &PlayerSession,
    request: AnswerRequest,
) -> Result<AnswerResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_game_store().await?;
    let now = SystemTime::now();
    settle_expiry(state, store.as_ref(), session.game_id, now).await?;

    let team_id = session.team_id;
    let (outcome, next_stage) = state
        .documents()
        .modify(store.as_ref(), session.game_id, |game: &mut Game| -> Result<_, PlayRefused> {
            lifecycle::ensure_playable(game, now)?;
            let stages = &game.stages;
            let team = game
                .teams
                .get_mut(&team_id)
                .ok_or(PlayRefused::UnknownTeam)?;
            let outcome = progression::submit_answer(stages, team, &request.answer, now)?;
            let next_stage = next_stage_view(stages, team, outcome.next_stage);
            Ok((outcome, next_stage))
        })
        .await
        .map_err(into_service_error)?;

    info!(
        game_id = %session.game_id,
        %team_id,
        player_id = %session.player_id,
        stage = outcome.stage_number,
        correct = outcome.is_correct,
        "answer recorded"
    );
    state.publish(TeamEvent::stage_completed(
        session.game_id,
        team_id,
        outcome.stage_number,
    ));

    Ok(AnswerResponse::new(outcome, next_stage))
}

/// Apply an unlock code to the current stage of the caller's team.
pub async fn submit_unlock(
    state: &SharedState,
    session: &PlayerSession,
    request: UnlockRequest,
) -> Result<UnlockResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_game_store().await?;
    let now = SystemTime::now();
    settle_expiry(state, store.as_ref(), session.game_id, now).await?;

    let team_id = session.team_id;
    let role = session.role;
    let (outcome, next_stage) = state
        .documents()
        .modify(store.as_ref(), session.game_id, |game: &mut Game| -> Result<_, PlayRefused> {
            lifecycle::ensure_playable(game, now)?;
            let mode = game.mode;
            let stages = &game.stages;
            let team = game
                .teams
                .get_mut(&team_id)
                .ok_or(PlayRefused::UnknownTeam)?;
            let outcome =
                progression::submit_unlock(mode, stages, team, role, &request.code, now)?;
            let next_stage = match &outcome {
                UnlockOutcome::Completed { next_stage, .. } => {
                    next_stage_view(stages, team, *next_stage)
                }
                UnlockOutcome::Revealed { .. } => None,
            };
            Ok((outcome, next_stage))
        })
        .await
        .map_err(into_service_error)?;

    let stage_number = outcome.stage_number();
    let event = match &outcome {
        UnlockOutcome::Revealed { .. } => {
            TeamEvent::stage_unlocked(session.game_id, team_id, stage_number)
        }
        UnlockOutcome::Completed { .. } => {
            TeamEvent::stage_completed(session.game_id, team_id, stage_number)
        }
    };
    info!(
        game_id = %session.game_id,
        %team_id,
        player_id = %session.player_id,
        stage = stage_number,
        "stage unlocked"
    );
    state.publish(event);

    Ok(UnlockResponse::new(outcome, next_stage))
}

fn next_stage_view(
    stages: &[Stage],
    team: &Team,
    next_stage: Option<u32>,
) -> Option<StageView> {
    let index = usize::try_from(next_stage?).ok()?.checked_sub(1)?;
    stages.get(index).map(|stage| StageView::for_team(stage, team))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::StreamExt;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        dto::join::JoinRequest,
        services::{
            seed::{self, DEMO_JOIN_TOKEN},
            session_service,
        },
        state::{AppState, game::TimerSettings},
    };

    async fn joined_demo() -> (SharedState, PlayerSession) {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        seed::seed_demo(&state).await.unwrap();
        let joined = session_service::join(
            &state,
            JoinRequest {
                join_token: DEMO_JOIN_TOKEN.into(),
                player_name: "Ana".into(),
            },
        )
        .await
        .unwrap();
        let session = session_service::resolve(&state, &joined.session_token)
            .await
            .unwrap();
        (state, session)
    }

    fn answer(text: &str) -> AnswerRequest {
        AnswerRequest {
            answer: text.into(),
        }
    }

    #[tokio::test]
    async fn answering_advances_and_notifies_the_team() {
        let (state, session) = joined_demo().await;
        let mut events = state.broker().subscribe(session.team_id);

        let response = submit_answer(&state, &session, answer("  1651 "))
            .await
            .unwrap();
        assert!(response.is_correct);
        assert_eq!(response.stage_number, 1);
        assert_eq!(response.next_stage.map(|stage| stage.stage_number), Some(2));

        let event = events.next().await.unwrap();
        assert_eq!(event, TeamEvent::stage_completed(session.game_id, session.team_id, 1));
    }

    #[tokio::test]
    async fn classic_games_have_no_unlock_step() {
        let (state, session) = joined_demo().await;
        let err = submit_unlock(&state, &session, UnlockRequest { code: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_timer_is_persisted_and_blocks_answers() {
        let (state, session) = joined_demo().await;
        let store = state.require_game_store().await.unwrap();
        state
            .documents()
            .modify(store.as_ref(), session.game_id, |game| {
                game.timer = Some(TimerSettings {
                    total_minutes: 1,
                    stage_minutes: None,
                });
                game.started_at = Some(SystemTime::now() - Duration::from_secs(120));
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        let snapshot = game_state(&state, &session).await.unwrap();
        assert_eq!(snapshot.game.status, GameStatus::Ended);

        let stored = state
            .documents()
            .load(store.as_ref(), session.game_id)
            .await
            .unwrap();
        assert_eq!(stored.status, GameStatus::Ended);
        assert!(stored.ended_at.is_some());

        let err = submit_answer(&state, &session, answer("1651"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(message) if message == "game has ended"));
    }

    #[tokio::test]
    async fn concurrent_answers_never_skip_a_stage() {
        let (state, session) = joined_demo().await;
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                let session = session.clone();
                tokio::spawn(async move { submit_answer(&state, &session, answer("guess")).await })
            })
            .collect();
        let mut stages = Vec::new();
        for task in tasks {
            stages.push(task.await.unwrap().unwrap().stage_number);
        }
        stages.sort_unstable();
        assert_eq!(stages, vec![1, 2, 3, 4]);

        let snapshot = game_state(&state, &session).await.unwrap();
        assert!(snapshot.game_complete);
        assert!(snapshot.current_stage.is_none());
    }
}
