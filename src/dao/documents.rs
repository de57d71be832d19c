//! Whole-document access to games.
//!
//! Every mutation of a game goes through [`GameDocuments::modify`]: the
//! per-game lock is held across load, closure and conditional write, so two
//! writers on the same game never interleave while different games proceed
//! independently. The revision check in [`GameStore::replace_game`] catches
//! writers outside this process.

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        migration::migrate,
        models::GameEntity,
        storage::StorageError,
    },
    state::game::{Game, LoadError},
};

/// Failure to read or write a game document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No game with this id.
    #[error("game `{0}` not found")]
    NotFound(Uuid),
    /// The stored document does not convert into a [`Game`].
    #[error("stored game `{id}` cannot be loaded")]
    Corrupt {
        /// Game whose document is broken.
        id: Uuid,
        /// What is wrong with it.
        #[source]
        source: LoadError,
    },
    /// The backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a refused [`GameDocuments::modify`].
#[derive(Debug, Error)]
pub enum ModifyError<E> {
    /// Loading or writing the document failed.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// The closure refused the change; nothing was written.
    #[error("modification rejected")]
    Rejected(E),
}

/// Per-game serialisation of read-modify-write cycles.
#[derive(Default)]
pub struct GameDocuments {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl GameDocuments {
    /// No game locked yet; locks are created on first use.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        // Clone out of the map so no shard lock is held while awaiting.
        self.locks.entry(id).or_default().value().clone()
    }

    /// Read the current version of a game.
    pub async fn load(&self, store: &dyn GameStore, id: Uuid) -> Result<Game, DocumentError> {
        let mut entity = store
            .find_game(id)
            .await?
            .ok_or(DocumentError::NotFound(id))?;
        migrate(&mut entity);
        Game::try_from(entity).map_err(|source| {
            warn!(game_id = %id, error = %source, "stored game failed to load");
            DocumentError::Corrupt { id, source }
        })
    }

    /// Persist a brand new game.
    pub async fn create(&self, store: &dyn GameStore, game: Game) -> Result<(), DocumentError> {
        let mut entity = GameEntity::from(game);
        entity.revision = 0;
        store.insert_game(entity).await?;
        Ok(())
    }

    /// Load a game, let `apply` change it and write the result back.
    ///
    /// When `apply` returns an error the document is left untouched.
    pub async fn modify<T, E, F>(
        &self,
        store: &dyn GameStore,
        id: Uuid,
        apply: F,
    ) -> Result<T, ModifyError<E>>
    where
        F: FnOnce(&mut Game) -> Result<T, E>,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut game = self.load(store, id).await?;
        let expected_revision = game.revision;

        let value = apply(&mut game).map_err(ModifyError::Rejected)?;

        game.revision = expected_revision + 1;
        game.updated_at = SystemTime::now();
        store
            .replace_game(GameEntity::from(game), expected_revision)
            .await
            .map_err(DocumentError::from)?;

        debug!(game_id = %id, revision = expected_revision + 1, "game document written");
        Ok(value)
    }
}
