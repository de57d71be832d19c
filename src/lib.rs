//! Library crate for trail-quest-back, exposing modules for binaries and integration tests.

/// Environment driven settings.
pub mod config;
/// Persistence: stores, entities and the document cache.
pub mod dao;
/// Wire types of the HTTP API.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared state and the game domain model.
pub mod state;
