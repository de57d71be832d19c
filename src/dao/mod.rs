/// Whole-document access with per-game serialisation.
pub mod documents;
/// Game state storage and retrieval operations.
pub mod game_store;
/// Load-time upgrade of older documents.
pub mod migration;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
