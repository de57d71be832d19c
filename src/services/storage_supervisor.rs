//! Storage backend selection and supervision.
//!
//! The server starts in degraded mode. The memory backend is installed right
//! away; remote backends are connected by a background task that retries with
//! exponential backoff and keeps polling the store once it is installed.

use std::{env, fmt, future::Future, str::FromStr, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info, warn};

#[cfg(feature = "couch-store")]
use crate::dao::game_store::couchdb::{CouchConfig, CouchGameStore};
#[cfg(feature = "mongo-store")]
use crate::dao::game_store::mongodb::{MongoConfig, MongoGameStore};
use crate::{
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    services::seed,
    state::SharedState,
};

/// Environment variable naming the backend to use.
pub const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const RECONNECT_ATTEMPTS: u32 = 3;

/// Persistence backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store, seeded with the demo game.
    Memory,
    /// MongoDB configured from `MONGO_URI` and `MONGO_DB`.
    #[cfg(feature = "mongo-store")]
    Mongo,
    /// CouchDB configured from the `COUCH_*` variables.
    #[cfg(feature = "couch-store")]
    Couch,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageBackend::Memory => "memory",
            #[cfg(feature = "mongo-store")]
            StorageBackend::Mongo => "mongo",
            #[cfg(feature = "couch-store")]
            StorageBackend::Couch => "couch",
        })
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(StorageBackend::Memory),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(StorageBackend::Couch),
            other => Err(format!("unsupported storage backend `{other}`")),
        }
    }
}

impl StorageBackend {
    /// Backend named by [`STORAGE_BACKEND_ENV`], defaulting to memory.
    pub fn from_env() -> Self {
        let raw = env::var(STORAGE_BACKEND_ENV).unwrap_or_default();
        raw.parse().unwrap_or_else(|err: String| {
            warn!(error = %err, "falling back to the memory backend");
            StorageBackend::Memory
        })
    }
}

/// Install or start connecting the selected backend.
///
/// Returns the supervision task for remote backends.
pub async fn start(state: SharedState, backend: StorageBackend) -> Option<JoinHandle<()>> {
    info!(%backend, "selecting storage backend");
    match backend {
        StorageBackend::Memory => {
            state.set_game_store(Arc::new(MemoryGameStore::new())).await;
            if state.config().seed_demo {
                if let Err(err) = seed::seed_demo(&state).await {
                    error!(error = %err, "failed to seed demo game");
                }
            }
            None
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => Some(tokio::spawn(run(state, || async {
            let config = MongoConfig::from_env().await?;
            let store = MongoGameStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn GameStore>)
        }))),
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => Some(tokio::spawn(run(state, || async {
            let config = CouchConfig::from_env()?;
            let store = CouchGameStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn GameStore>)
        }))),
    }
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

/// Try to revive an unhealthy store in place. Returns whether it recovered.
async fn recover(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnected");
                state.update_degraded(false).await;
                return true;
            }
            Err(err) => {
                if attempt == 1 {
                    warn!(attempt, error = %err, "storage unreachable; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect failed");
                }
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }
    false
}

/// Keep polling an installed store until it cannot be revived.
async fn watch(state: &SharedState, store: &dyn GameStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !recover(state, store).await {
                    warn!("storage reconnect attempts exhausted; reconnecting from scratch");
                    return;
                }
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Connect through `connect`, install the store and supervise it forever.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connected; leaving degraded mode");
                delay = INITIAL_DELAY;
                watch(&state, store.as_ref()).await;
            }
            Err(err) => {
                warn!(error = %err, retry_in_ms = delay.as_millis() as u64, "storage connection failed");
                state.update_degraded(true).await;
            }
        }
        sleep(delay).await;
        delay = next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!("".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Memory ".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[tokio::test]
    async fn memory_backend_is_installed_and_seeded() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        let handle = start(state.clone(), StorageBackend::Memory).await;
        assert!(handle.is_none());
        assert!(!state.is_degraded().await);

        let store = state.game_store().await.unwrap();
        let game = store
            .find_game_by_token(seed::DEMO_JOIN_TOKEN.to_owned())
            .await
            .unwrap();
        assert!(game.is_some());
    }
}
