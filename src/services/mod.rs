/// Organiser operations: game creation, inspection and status changes.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Gameplay: state snapshots, answers and unlocks.
pub mod play_service;
/// Demo game installed on fresh in-memory deployments.
pub mod seed;
/// Joining teams and resolving session tokens.
pub mod session_service;
/// Server-Sent Events streams fed by the team broker.
pub mod sse_service;
/// Storage backend selection and reconnect supervision.
pub mod storage_supervisor;
