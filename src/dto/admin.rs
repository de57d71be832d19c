//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameListItemEntity, StageEntity},
    dto::{format_system_time, play::PlayerSummary, validation::validate_not_blank},
    state::game::{Game, GameStatus},
};

/// Minimal projection of a game when listed for administrators.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameListItem {
    /// Game id.
    pub id: Uuid,
    /// Game name.
    pub name: String,
    /// Stored status.
    pub status: String,
    /// Play mode.
    pub mode: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Number of teams.
    pub team_count: usize,
}

impl From<GameListItemEntity> for GameListItem {
    fn from(value: GameListItemEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            status: value.status,
            mode: value.mode,
            created_at: format_system_time(value.created_at),
            team_count: value.team_count,
        }
    }
}

/// Stage snapshot supplied when creating a game. Which fields are required depends on the mode.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StageInput {
    /// Location label.
    #[validate(custom(function = "validate_not_blank"))]
    pub location: String,
    /// Clue leading to the location.
    #[serde(default)]
    pub clue: String,
    /// Question, for modes that ask one.
    #[serde(default)]
    pub question: Option<String>,
    /// Expected answer.
    #[serde(default)]
    pub answer: Option<String>,
    /// Code posted at the location (qr modes).
    #[serde(default)]
    pub unlock_code: Option<String>,
    /// Number posted at the location (math puzzle).
    #[serde(default)]
    pub location_number: Option<i64>,
}

impl StageInput {
    /// Flat stage entity numbered by its position.
    pub fn into_entity(self, number: u32) -> StageEntity {
        StageEntity {
            number,
            location: self.location,
            clue: self.clue,
            question: self.question,
            answer: self.answer,
            unlock_code: self.unlock_code,
            location_number: self.location_number,
        }
    }
}

/// Team to create; tokens and secret are generated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    #[validate(
        length(min = 1, max = 60, message = "team name must be 1 to 60 characters"),
        custom(function = "validate_not_blank")
    )]
    /// Display name.
    pub name: String,
}

/// Create a game from an inline scenario snapshot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Game name.
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    /// One of `classic`, `qr_quiz`, `qr_hunt`, `math_puzzle`, `guided`.
    pub mode: String,
    /// Guided games only.
    #[serde(default)]
    pub has_questions: bool,
    /// Generate supervisor tokens for every team.
    #[serde(default)]
    pub supervised: bool,
    /// Enables the timer when set.
    #[serde(default)]
    #[validate(range(min = 1, max = 1440))]
    pub timer_minutes: Option<u32>,
    /// Per-stage hint timer shown to players.
    #[serde(default)]
    #[validate(range(min = 1, max = 1440))]
    pub stage_timer_minutes: Option<u32>,
    /// Stages in play order.
    #[validate(length(min = 1, message = "at least one stage is required"), nested)]
    pub stages: Vec<StageInput>,
    /// Teams to create.
    #[validate(length(min = 1, message = "at least one team is required"), nested)]
    pub teams: Vec<TeamInput>,
}

/// Explicit status change requested by an organiser.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// Target status.
    pub status: GameStatus,
}

/// Stage with its solutions, as organisers see it.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStage {
    /// 1-based position.
    pub stage_number: u32,
    /// Location label.
    pub location: String,
    /// Clue text.
    pub clue: String,
    /// Question, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Expected answer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Unlock code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_code: Option<String>,
    /// Location number, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_number: Option<i64>,
}

/// Team with its tokens, secret and progress.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminTeam {
    /// Team id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Player join token.
    pub join_token: String,
    /// Supervisor join token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_token: Option<String>,
    /// Math puzzle secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_secret: Option<i64>,
    /// Stages whose location was reached.
    pub unlocked_stages: Vec<u32>,
    /// Number of completed stages.
    pub completed_stages: usize,
    /// Number of correct answers.
    pub correct_answers: usize,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
}

/// Full organiser view of a game, tokens and answers included.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameDetail {
    /// Game id.
    pub id: Uuid,
    /// Stored revision, bumped on every write.
    pub revision: u64,
    /// Game name.
    pub name: String,
    /// Stored status.
    pub status: GameStatus,
    /// Status after accounting for an expired timer.
    pub effective_status: GameStatus,
    /// Play mode.
    pub mode: String,
    /// Guided games only.
    pub has_questions: bool,
    /// Whether teams have supervisor tokens.
    pub supervised: bool,
    /// Game timer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_minutes: Option<u32>,
    /// Per-stage timer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_timer_minutes: Option<u32>,
    /// RFC 3339 time of the first activation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// RFC 3339 end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Stages in play order.
    pub stages: Vec<AdminStage>,
    /// Teams of the game.
    pub teams: Vec<AdminTeam>,
}

impl GameDetail {
    /// Project `game`; `effective_status` comes from the expiry check.
    pub fn build(game: Game, effective_status: GameStatus) -> Self {
        let total_stages = game.total_stages();
        let teams = game
            .teams
            .values()
            .map(|team| AdminTeam {
                id: team.id,
                name: team.name.clone(),
                join_token: team.join_token.clone(),
                supervisor_token: team.supervisor_token.clone(),
                team_secret: team.team_secret,
                unlocked_stages: team.unlocked.iter().copied().collect(),
                completed_stages: team.answered_count().min(total_stages),
                correct_answers: team.results.iter().filter(|r| r.is_correct).count(),
                players: team.players.iter().map(PlayerSummary::from).collect(),
            })
            .collect();

        Self {
            id: game.id,
            revision: game.revision,
            name: game.name.clone(),
            status: game.status,
            effective_status,
            mode: game.mode.as_str().to_owned(),
            has_questions: game.mode.has_questions(),
            supervised: game.supervised,
            timer_minutes: game.timer.map(|timer| timer.total_minutes),
            stage_timer_minutes: game.timer.and_then(|timer| timer.stage_minutes),
            started_at: game.started_at.map(format_system_time),
            ended_at: game.ended_at.map(format_system_time),
            created_at: format_system_time(game.created_at),
            stages: game
                .stages
                .into_iter()
                .map(|stage| {
                    let entity = StageEntity::from(stage);
                    AdminStage {
                        stage_number: entity.number,
                        location: entity.location,
                        clue: entity.clue,
                        question: entity.question,
                        answer: entity.answer,
                        unlock_code: entity.unlock_code,
                        location_number: entity.location_number,
                    }
                })
                .collect(),
            teams,
        }
    }
}
