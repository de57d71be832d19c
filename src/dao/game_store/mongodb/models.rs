use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{GameEntity, PlayerSessionEntity, StageEntity, TeamEntity};

/// Game document as stored in the `games` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    revision: i64,
    name: String,
    status: String,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    has_questions: bool,
    #[serde(default)]
    supervised: bool,
    #[serde(default)]
    timer_enabled: Option<bool>,
    #[serde(default)]
    timer_minutes: Option<u32>,
    #[serde(default)]
    stage_timer_minutes: Option<u32>,
    #[serde(default)]
    started_at: Option<DateTime>,
    #[serde(default)]
    ended_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
    stages: Vec<StageEntity>,
    teams: Vec<TeamEntity>,
}

impl MongoGameDocument {
    pub fn revision(&self) -> i64 {
        self.revision
    }
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            schema_version: value.schema_version,
            revision: revision_to_bson(value.revision),
            name: value.name,
            status: value.status,
            mode: value.mode,
            has_questions: value.has_questions,
            supervised: value.supervised,
            timer_enabled: value.timer_enabled,
            timer_minutes: value.timer_minutes,
            stage_timer_minutes: value.stage_timer_minutes,
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            stages: value.stages,
            teams: value.teams,
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> MongoResult<Self> {
        let id = parse_uuid(&value.id, &value.id)?;
        let revision = u64::try_from(value.revision).map_err(|_| MongoDaoError::MalformedDocument {
            id: value.id.clone(),
            reason: format!("negative revision {}", value.revision),
        })?;

        Ok(Self {
            id,
            schema_version: value.schema_version,
            revision,
            name: value.name,
            status: value.status,
            mode: value.mode,
            has_questions: value.has_questions,
            supervised: value.supervised,
            timer_enabled: value.timer_enabled,
            timer_minutes: value.timer_minutes,
            stage_timer_minutes: value.stage_timer_minutes,
            started_at: value.started_at.map(DateTime::to_system_time),
            ended_at: value.ended_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            stages: value.stages,
            teams: value.teams,
        })
    }
}

/// Session record stored in the `player_sessions` collection, keyed by token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    token: String,
    player_id: String,
    team_id: String,
    game_id: String,
    role: String,
    created_at: DateTime,
}

impl From<PlayerSessionEntity> for MongoSessionDocument {
    fn from(value: PlayerSessionEntity) -> Self {
        Self {
            token: value.token,
            player_id: value.player_id.to_string(),
            team_id: value.team_id.to_string(),
            game_id: value.game_id.to_string(),
            role: value.role,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoSessionDocument> for PlayerSessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSessionDocument) -> MongoResult<Self> {
        let key = format!("session of player {}", value.player_id);
        Ok(Self {
            player_id: parse_uuid(&key, &value.player_id)?,
            team_id: parse_uuid(&key, &value.team_id)?,
            game_id: parse_uuid(&key, &value.game_id)?,
            token: value.token,
            role: value.role,
            created_at: value.created_at.to_system_time(),
        })
    }
}

pub fn parse_uuid(document: &str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::MalformedDocument {
        id: document.to_owned(),
        reason: format!("invalid uuid `{raw}`: {err}"),
    })
}

/// Revisions never get close to `i64::MAX`; saturate rather than wrap.
pub fn revision_to_bson(revision: u64) -> i64 {
    i64::try_from(revision).unwrap_or(i64::MAX)
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching a game only at the given revision.
pub fn doc_id_at_revision(id: Uuid, revision: u64) -> Document {
    doc! {"_id": id.to_string(), "revision": revision_to_bson(revision)}
}

/// Filter matching games with a team whose join or supervisor token is `token`.
pub fn join_token_filter(token: &str) -> Document {
    doc! {
        "$or": [
            {"teams.join_token": token},
            {"teams.supervisor_token": token},
        ]
    }
}
