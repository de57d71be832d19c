//! Request and response bodies of the HTTP API.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Admin game management payloads.
pub mod admin;
/// Health check payload.
pub mod health;
/// Join request and issued session.
pub mod join;
/// State snapshot, answer and unlock payloads.
pub mod play;
/// Server-sent event frames.
pub mod sse;
/// Custom `validator` rules.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
