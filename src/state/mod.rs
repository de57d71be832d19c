//! Shared application state and the game domain model.

/// Per-team event fan-out feeding the SSE streams.
pub mod broker;
/// Game aggregate, stages, teams and players.
pub mod game;
/// Status rules and timer expiry.
pub mod lifecycle;
/// Answer and unlock rules for every play mode.
pub mod progression;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{documents::GameDocuments, game_store::GameStore},
    dto::sse::TeamEvent,
    error::ServiceError,
};

use self::broker::Broker;

/// Handle passed to every router and service.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, document locks and the team broker.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    documents: GameDocuments,
    broker: Arc<Broker>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Degraded until the storage supervisor installs a backend.
    pub fn new(config: AppConfig) -> SharedState {
        let degraded = watch::Sender::new(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            documents: GameDocuments::new(),
            broker: Broker::new(config.subscriber_buffer),
            config,
            degraded,
        })
    }

    /// Installed store, `None` while degraded.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        self.game_store.read().await.clone()
    }

    /// Current game store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Swap in `store` and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        *self.game_store.write().await = Some(store);
        self.update_degraded(false).await;
    }

    /// Whether no healthy store is currently installed.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Receivers only wake up when the flag actually flips.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded
            .send_if_modified(|current| std::mem::replace(current, value) != value);
    }

    /// Per-game serialisation of document writes.
    pub fn documents(&self) -> &GameDocuments {
        &self.documents
    }

    /// Team event broker feeding the SSE streams.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Publish `event` to the subscribers of its team.
    pub fn publish(&self, event: TeamEvent) {
        self.broker.publish(event.team_id, event);
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
