/// CouchDB backed store.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Process-local store.
pub mod memory;
/// MongoDB backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameEntity, GameListItemEntity, PlayerSessionEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for game documents and player sessions.
///
/// Game documents are only ever written whole. [`GameStore::replace_game`] is a
/// conditional write that fails with [`crate::dao::storage::StorageError::RevisionConflict`]
/// when the stored revision differs from `expected_revision`.
pub trait GameStore: Send + Sync {
    /// Persist a new game document.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a game document by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Overwrite the document if its revision is still `expected_revision`.
    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Summaries of every stored game.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>>;
    /// Game owning a team whose join or supervisor token equals `token`.
    fn find_game_by_token(&self, token: String)
    -> BoxFuture<'static, StorageResult<Option<Uuid>>>;
    /// Persist a player session.
    fn insert_session(&self, session: PlayerSessionEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Session issued under `token`, if any.
    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerSessionEntity>>>;
    /// Cheap round trip to the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
