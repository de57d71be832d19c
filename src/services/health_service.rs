use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the installed store; a missing or failing backend reports degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.game_store().await else {
        warn!("health check while no storage backend is installed");
        return HealthResponse::degraded();
    };

    match store.health_check().await {
        Ok(()) if !state.is_degraded().await => HealthResponse::ok(),
        Ok(()) => HealthResponse::degraded(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::game_store::memory::MemoryGameStore, dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        state.set_game_store(Arc::new(MemoryGameStore::new())).await;
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);
    }
}
