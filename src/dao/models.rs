//! Persisted shapes of the game document and player sessions.
//!
//! These mirror what is written to the backends and stay deliberately loose
//! (string tags, optional fields) so that older documents keep deserializing.
//! [`crate::dao::migration`] upgrades them and [`crate::state::game`] turns them
//! into the strongly typed runtime model.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Aggregate game document persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Layout version of this document, see [`crate::dao::migration`].
    #[serde(default)]
    pub schema_version: u32,
    /// Incremented on every successful write; used for conditional updates.
    #[serde(default)]
    pub revision: u64,
    /// Display name, usually the scenario title.
    pub name: String,
    /// One of `draft`, `active`, `paused`, `ended`.
    pub status: String,
    /// Play mode tag. Legacy documents may carry an empty string.
    #[serde(default)]
    pub mode: String,
    /// Guided mode only: whether stages carry questions.
    #[serde(default)]
    pub has_questions: bool,
    /// Whether teams receive a supervisor join token.
    #[serde(default)]
    pub supervised: bool,
    /// Explicit timer flag. Absent on documents written before it existed.
    #[serde(default)]
    pub timer_enabled: Option<bool>,
    /// Overall game duration in minutes.
    #[serde(default)]
    pub timer_minutes: Option<u32>,
    /// Suggested duration per stage in minutes.
    #[serde(default)]
    pub stage_timer_minutes: Option<u32>,
    /// Set on the first draft to active transition.
    #[serde(default)]
    pub started_at: Option<SystemTime>,
    /// Set when the game ends.
    #[serde(default)]
    pub ended_at: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last write timestamp.
    pub updated_at: SystemTime,
    /// Stages snapshotted from the scenario, ordered by number.
    pub stages: Vec<StageEntity>,
    /// Participating teams in display order.
    pub teams: Vec<TeamEntity>,
}

/// Flat representation of a stage; which optional fields are set depends on the mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageEntity {
    /// 1-based position.
    pub number: u32,
    /// Location label shown to the team.
    pub location: String,
    /// Clue text leading to the location.
    pub clue: String,
    /// Question asked once the stage is reached.
    #[serde(default)]
    pub question: Option<String>,
    /// Expected answer, compared case-insensitively.
    #[serde(default)]
    pub answer: Option<String>,
    /// Code posted at the location.
    #[serde(default)]
    pub unlock_code: Option<String>,
    /// Number posted at the location, added to the team secret.
    #[serde(default)]
    pub location_number: Option<i64>,
}

/// Team stored inside the game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Team id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Token players use to join this team.
    pub join_token: String,
    /// Token a supervisor uses to join this team (supervised games only).
    #[serde(default)]
    pub supervisor_token: Option<String>,
    /// Math puzzle secret.
    #[serde(default)]
    pub team_secret: Option<i64>,
    /// Stages whose location was reached.
    #[serde(default)]
    pub unlocked_stages: Vec<u32>,
    /// Players in join order.
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
    /// Completed stages in completion order.
    #[serde(default)]
    pub results: Vec<StageResultEntity>,
}

/// Player stored inside its team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Player id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// `player` or `supervisor`.
    pub role: String,
    /// Bearer token issued on join.
    pub session_token: String,
    /// When the player joined.
    pub joined_at: SystemTime,
}

/// One completed stage of a team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageResultEntity {
    /// Stage completed.
    pub stage_number: u32,
    /// Answer as submitted; empty for code-only stages.
    #[serde(default)]
    pub answer: String,
    /// Whether the answer matched.
    pub is_correct: bool,
    /// When the stage was completed.
    pub completed_at: SystemTime,
}

/// Lookup record binding a session token to its player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSessionEntity {
    /// Bearer token.
    pub token: String,
    /// Player the token belongs to.
    pub player_id: Uuid,
    /// Team of that player.
    pub team_id: Uuid,
    /// Game of that team.
    pub game_id: Uuid,
    /// `player` or `supervisor`.
    pub role: String,
    /// When the token was issued.
    pub created_at: SystemTime,
}

/// Subset of [`GameEntity`] used when listing games.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameListItemEntity {
    /// Game id.
    pub id: Uuid,
    /// Game name.
    pub name: String,
    /// Stored status.
    pub status: String,
    /// Play mode.
    pub mode: String,
    /// Creation time.
    pub created_at: SystemTime,
    /// Number of teams.
    pub team_count: usize,
}

impl GameEntity {
    /// Whether `token` is the join or supervisor token of one of the teams.
    pub fn has_join_token(&self, token: &str) -> bool {
        self.teams.iter().any(|team| {
            team.join_token == token || team.supervisor_token.as_deref() == Some(token)
        })
    }
}

impl From<&GameEntity> for GameListItemEntity {
    fn from(entity: &GameEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            status: entity.status.clone(),
            mode: entity.mode.clone(),
            created_at: entity.created_at,
            team_count: entity.teams.len(),
        }
    }
}
