use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoGameDocument, MongoSessionDocument, doc_id, doc_id_at_revision, join_token_filter,
        parse_uuid,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity, PlayerSessionEntity},
    storage::StorageResult,
};

const GAMES: &str = "games";
const SESSIONS: &str = "player_sessions";

/// Team token lookups go through these. Both tokens are unique across games.
const TOKEN_INDEXES: [(&str, &str); 2] = [
    ("teams.join_token", "team_join_token_idx"),
    ("teams.supervisor_token", "team_supervisor_token_idx"),
];

/// Unique index over `field`, restricted to documents where it holds a string
/// so games without supervisor tokens never collide on a missing value.
fn token_index(field: &str, name: &str) -> IndexModel {
    let mut keys = Document::new();
    keys.insert(field, 1);
    let mut present = Document::new();
    present.insert(field, doc! { "$type": "string" });
    let options = IndexOptions::builder()
        .name(Some(name.to_owned()))
        .unique(Some(true))
        .partial_filter_expression(Some(present))
        .build();
    IndexModel::builder().keys(keys).options(options).build()
}

/// [`GameStore`] over the `games` and `sessions` collections.
#[derive(Clone)]
pub struct MongoGameStore {
    shared: Arc<Shared>,
}

struct Shared {
    config: MongoConfig,
    // The client must outlive the database handle derived from it.
    handle: RwLock<(Client, Database)>,
}

impl MongoGameStore {
    /// Connect, then make sure the token indexes exist.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let handle = establish_connection(&config.options, &config.database_name).await?;
        let store = Self {
            shared: Arc::new(Shared {
                config,
                handle: RwLock::new(handle),
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn database(&self) -> Database {
        self.shared.handle.read().await.1.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn ping(&self) -> MongoResult<()> {
        self.database()
            .await
            .run_command(doc! { "ping": 1 })
            .await
            .map(drop)
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let config = &self.shared.config;
        let fresh = establish_connection(&config.options, &config.database_name).await?;
        *self.shared.handle.write().await = fresh;
        Ok(())
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let games = self.collection::<Document>(GAMES).await;
        for (field, name) in TOKEN_INDEXES {
            games
                .create_index(token_index(field, name))
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: GAMES,
                    index: field,
                    source,
                })?;
        }
        Ok(())
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let collection = self.collection::<MongoGameDocument>(GAMES).await;
        collection.insert_one(&document).await.map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::Duplicate {
                    kind: "game",
                    key: id.to_string(),
                }
            } else {
                MongoDaoError::InsertGame { id, source }
            }
        })?;
        Ok(())
    }

    /// Replace the document only if it is still at `expected_revision`.
    async fn replace_game(&self, game: GameEntity, expected_revision: u64) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let collection = self.collection::<MongoGameDocument>(GAMES).await;
        let result = collection
            .replace_one(doc_id_at_revision(id, expected_revision), &document)
            .await
            .map_err(|source| MongoDaoError::ReplaceGame { id, source })?;

        if result.matched_count == 0 {
            debug!(game_id = %id, expected_revision, "conditional replace matched nothing");
            return Err(MongoDaoError::RevisionConflict {
                id,
                expected: expected_revision,
            });
        }
        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let collection = self.collection::<MongoGameDocument>(GAMES).await;

        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;

        document.map(GameEntity::try_from).transpose()
    }

    async fn list_games(&self) -> MongoResult<Vec<GameListItemEntity>> {
        let collection = self.collection::<MongoGameDocument>(GAMES).await;

        let documents: Vec<MongoGameDocument> = collection
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?;

        documents
            .into_iter()
            .map(|document| {
                let entity = GameEntity::try_from(document)?;
                Ok(GameListItemEntity::from(&entity))
            })
            .collect()
    }

    async fn find_game_by_token(&self, token: String) -> MongoResult<Option<Uuid>> {
        let games = self.collection::<Document>(GAMES).await;
        let found = games
            .find_one(join_token_filter(&token))
            .projection(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::FindByToken { source })?;

        let Some(document) = found else {
            return Ok(None);
        };
        let raw_id = document
            .get_str("_id")
            .map_err(|err| MongoDaoError::MalformedDocument {
                id: document.to_string(),
                reason: err.to_string(),
            })?;
        parse_uuid(raw_id, raw_id).map(Some)
    }

    async fn insert_session(&self, session: PlayerSessionEntity) -> MongoResult<()> {
        let player_id = session.player_id;
        let document: MongoSessionDocument = session.into();
        let collection = self.collection::<MongoSessionDocument>(SESSIONS).await;
        collection.insert_one(&document).await.map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::Duplicate {
                    kind: "session",
                    key: player_id.to_string(),
                }
            } else {
                MongoDaoError::InsertSession { source }
            }
        })?;
        Ok(())
    }

    async fn find_session(&self, token: String) -> MongoResult<Option<PlayerSessionEntity>> {
        let collection = self.collection::<MongoSessionDocument>(SESSIONS).await;
        let document = collection
            .find_one(doc! {"_id": token})
            .await
            .map_err(|source| MongoDaoError::LoadSession { source })?;

        document.map(PlayerSessionEntity::try_from).transpose()
    }
}

impl GameStore for MongoGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_game(game, expected_revision)
                .await
                .map_err(Into::into)
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games().await.map_err(Into::into) })
    }

    fn find_game_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game_by_token(token).await.map_err(Into::into) })
    }

    fn insert_session(
        &self,
        session: PlayerSessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await.map_err(Into::into) })
    }

    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(token).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reconnect().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_token_index_is_unique_over_string_values() {
        for (field, name) in TOKEN_INDEXES {
            let index = token_index(field, name);
            assert_eq!(index.keys.get_i32(field).ok(), Some(1));

            let options = index.options.expect("index options");
            assert_eq!(options.name.as_deref(), Some(name));
            assert_eq!(options.unique, Some(true));
            assert_eq!(options.sparse, None);
            let filter = options
                .partial_filter_expression
                .expect("partial filter");
            assert_eq!(
                filter
                    .get_document(field)
                    .ok()
                    .and_then(|f| f.get_str("$type").ok()),
                Some("string")
            );
        }
    }

    #[test]
    fn supervisor_tokens_are_indexed() {
        assert!(
            TOKEN_INDEXES
                .iter()
                .any(|(field, _)| *field == "teams.supervisor_token")
        );
    }
}
