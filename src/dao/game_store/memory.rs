//! Process-local store used for tests and local development.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity, PlayerSessionEntity},
    storage::{StorageError, StorageResult},
};

/// [`GameStore`] keeping every document in memory.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, GameEntity>,
    sessions: DashMap<String, PlayerSessionEntity>,
}

impl MemoryGameStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn store_game(&self, game: GameEntity) -> StorageResult<()> {
        match self.inner.games.entry(game.id) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                kind: "game",
                key: game.id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(game);
                Ok(())
            }
        }
    }

    fn swap_game(&self, game: GameEntity, expected_revision: u64) -> StorageResult<()> {
        let game_id = game.id;
        let conflict = || StorageError::RevisionConflict {
            game_id,
            expected: expected_revision,
        };
        let mut stored = self.inner.games.get_mut(&game_id).ok_or_else(conflict)?;
        if stored.revision != expected_revision {
            return Err(conflict());
        }
        *stored = game;
        Ok(())
    }

    fn game_with_token(&self, token: &str) -> Option<Uuid> {
        self.inner
            .games
            .iter()
            .find(|entry| entry.has_join_token(token))
            .map(|entry| entry.id)
    }

    fn store_session(&self, session: PlayerSessionEntity) -> StorageResult<()> {
        match self.inner.sessions.entry(session.token.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                kind: "session",
                key: session.player_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }
}

impl GameStore for MemoryGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.store_game(game);
        Box::pin(async move { result })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let game = self.inner.games.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(game) })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.swap_game(game, expected_revision);
        Box::pin(async move { result })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let mut games: Vec<GameListItemEntity> = self
            .inner
            .games
            .iter()
            .map(|entry| GameListItemEntity::from(entry.value()))
            .collect();
        games.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Box::pin(async move { Ok(games) })
    }

    fn find_game_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        let game_id = self.game_with_token(&token);
        Box::pin(async move { Ok(game_id) })
    }

    fn insert_session(
        &self,
        session: PlayerSessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.store_session(session);
        Box::pin(async move { result })
    }

    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerSessionEntity>>> {
        let session = self.inner.sessions.get(&token).map(|entry| entry.clone());
        Box::pin(async move { Ok(session) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::TeamEntity;

    fn game() -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            schema_version: 1,
            revision: 0,
            name: "Incas".into(),
            status: "active".into(),
            mode: "classic".into(),
            has_questions: false,
            supervised: true,
            timer_enabled: Some(false),
            timer_minutes: None,
            stage_timer_minutes: None,
            started_at: None,
            ended_at: None,
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
            stages: Vec::new(),
            teams: vec![TeamEntity {
                id: Uuid::new_v4(),
                name: "Condors".into(),
                join_token: "condors".into(),
                supervisor_token: Some("condors-staff".into()),
                team_secret: None,
                unlocked_stages: Vec::new(),
                players: Vec::new(),
                results: Vec::new(),
            }],
        }
    }

    #[tokio::test]
    async fn replace_requires_matching_revision() {
        let store = MemoryGameStore::new();
        let mut entity = game();
        GameStore::insert_game(&store, entity.clone()).await.unwrap();

        entity.revision = 1;
        GameStore::replace_game(&store, entity.clone(), 0).await.unwrap();

        let stale = GameStore::replace_game(&store, entity.clone(), 0).await;
        assert!(matches!(
            stale,
            Err(StorageError::RevisionConflict { expected: 0, .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_game_is_rejected() {
        let store = MemoryGameStore::new();
        let entity = game();
        GameStore::insert_game(&store, entity.clone()).await.unwrap();
        assert!(matches!(
            GameStore::insert_game(&store, entity).await,
            Err(StorageError::Duplicate { kind: "game", .. })
        ));
    }

    #[tokio::test]
    async fn finds_games_by_join_and_supervisor_token() {
        let store = MemoryGameStore::new();
        let entity = game();
        let id = entity.id;
        GameStore::insert_game(&store, entity).await.unwrap();

        let by_join = GameStore::find_game_by_token(&store, "condors".into()).await;
        let by_staff = GameStore::find_game_by_token(&store, "condors-staff".into()).await;
        let unknown = GameStore::find_game_by_token(&store, "pumas".into()).await;
        assert_eq!(by_join.unwrap(), Some(id));
        assert_eq!(by_staff.unwrap(), Some(id));
        assert_eq!(unknown.unwrap(), None);
    }
}
