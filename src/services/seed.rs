//! Demo content installed on fresh in-memory deployments.

use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        SharedState,
        game::{Game, GameMode, GameStatus, Question, Stage, StageChallenge, Team},
    },
};

/// Join token of the demo team.
pub const DEMO_JOIN_TOKEN: &str = "incas-2025";

const DEMO_STAGES: [(&str, &str, &str, &str); 4] = [
    (
        "Plaza de Armas, Cusco",
        "Start where the cathedral bells ring over the main square.",
        "Which year is carved above the cathedral door?",
        "1651",
    ),
    (
        "Qorikancha",
        "Follow Avenida El Sol to the temple whose walls were once covered in gold.",
        "To which Inca god was the temple dedicated?",
        "Inti",
    ),
    (
        "Sacsayhuamán",
        "Climb north to the fortress built from stones no blade can slip between.",
        "How many zigzag terrace walls guard the esplanade?",
        "3",
    ),
    (
        "Machu Picchu",
        "Take the train down the Urubamba valley to the citadel in the clouds.",
        "What is the name of the carved ritual stone on the highest terrace?",
        "Intihuatana",
    ),
];

fn demo_game(now: SystemTime) -> Game {
    let stages = DEMO_STAGES
        .iter()
        .zip(1u32..)
        .map(|(&(location, clue, prompt, answer), number)| Stage {
            number,
            location: location.to_owned(),
            clue: clue.to_owned(),
            challenge: StageChallenge::Classic {
                question: Question {
                    prompt: prompt.to_owned(),
                    answer: answer.to_owned(),
                },
            },
        })
        .collect();

    let team = Team {
        id: Uuid::new_v4(),
        name: "Incas".into(),
        join_token: DEMO_JOIN_TOKEN.into(),
        supervisor_token: None,
        team_secret: None,
        unlocked: Default::default(),
        players: Vec::new(),
        results: Vec::new(),
    };

    Game {
        id: Uuid::new_v4(),
        revision: 0,
        name: "The Inca Trail".into(),
        status: GameStatus::Active,
        mode: GameMode::Classic,
        supervised: false,
        timer: None,
        started_at: Some(now),
        ended_at: None,
        created_at: now,
        updated_at: now,
        stages,
        teams: IndexMap::from([(team.id, team)]),
    }
}

/// Install the demo game unless a game already owns its join token.
///
/// Returns whether a game was created.
pub async fn seed_demo(state: &SharedState) -> Result<bool, ServiceError> {
    let store = state.require_game_store().await?;
    if let Some(game_id) = store.find_game_by_token(DEMO_JOIN_TOKEN.to_owned()).await? {
        debug!(%game_id, "demo game already present");
        return Ok(false);
    }

    let game = demo_game(SystemTime::now());
    let game_id = game.id;
    state.documents().create(store.as_ref(), game).await?;
    info!(%game_id, join_token = DEMO_JOIN_TOKEN, "seeded demo game");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState,
    };

    #[test]
    fn demo_game_is_a_valid_document() {
        let game = demo_game(SystemTime::UNIX_EPOCH);
        let entity = crate::dao::models::GameEntity::from(game.clone());
        assert_eq!(Game::try_from(entity).unwrap(), game);
        assert_eq!(game.total_stages(), 4);
    }

    #[tokio::test]
    async fn seeding_twice_creates_one_game() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryGameStore::new());
        state.set_game_store(store.clone()).await;

        assert!(seed_demo(&state).await.unwrap());
        assert!(!seed_demo(&state).await.unwrap());

        let games = crate::dao::game_store::GameStore::list_games(store.as_ref())
            .await
            .unwrap();
        assert_eq!(games.len(), 1);
    }
}
