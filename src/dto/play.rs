use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{
        game::{Game, GameMode, GameStatus, Player, PlayerRole, Stage, Team},
        lifecycle,
        progression::{AnswerOutcome, UnlockOutcome},
    },
};

/// Answer for the team's current stage.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    /// Free text, compared case-insensitively.
    #[validate(length(max = 500, message = "answer must be at most 500 characters"))]
    pub answer: String,
}

/// Unlock code for the team's current stage. Supervisors of guided games may send an empty code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UnlockRequest {
    /// Code read at the location.
    #[serde(default)]
    #[validate(length(max = 128, message = "code must be at most 128 characters"))]
    pub code: String,
}

/// What a team sees of a stage.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    /// 1-based position.
    pub stage_number: u32,
    /// Location label.
    pub location: String,
    /// Clue text.
    pub clue: String,
    /// Whether an unlock step is part of this stage.
    pub requires_unlock: bool,
    /// Whether the stage still waits for its unlock.
    pub locked: bool,
    /// Whether the stage asks a question.
    pub has_question: bool,
    /// Only present once the question is visible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl StageView {
    /// `stage` with its question hidden while `team` has not unlocked it.
    pub fn for_team(stage: &Stage, team: &Team) -> Self {
        let requires_unlock = stage.challenge.requires_unlock();
        let locked = requires_unlock && !team.is_unlocked(stage.number);
        let question = stage.challenge.question();
        Self {
            stage_number: stage.number,
            location: stage.location.clone(),
            clue: stage.clue.clone(),
            requires_unlock,
            locked,
            has_question: question.is_some(),
            question: question
                .filter(|_| !locked)
                .map(|question| question.prompt.clone()),
        }
    }
}

/// A stage the team already finished.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStage {
    /// Stage completed.
    pub stage_number: u32,
    /// Location label.
    pub location: String,
    /// Answer the team gave.
    pub answer: String,
    /// Whether it matched.
    pub is_correct: bool,
    /// Revealed after the stage is done; absent for stages without a question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// RFC 3339 completion time.
    pub completed_at: String,
}

/// Public view of a player.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Player id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Player or supervisor.
    pub role: PlayerRole,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            role: player.role,
        }
    }
}

/// Game-level information visible to players.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    /// Game id.
    pub id: Uuid,
    /// Game name.
    pub name: String,
    /// Status after accounting for an expired timer.
    pub status: GameStatus,
    /// Play mode.
    pub mode: String,
    /// Guided games only.
    pub has_questions: bool,
    /// Whether supervisors take part.
    pub supervised: bool,
    /// Whether a game timer is set.
    pub timer_enabled: bool,
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
    /// When the timer runs out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    /// Number of stages.
    pub total_stages: usize,
}

/// The caller's team.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    /// Team id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Only sent in math puzzle games.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_secret: Option<i64>,
    /// Stages whose location was reached.
    pub unlocked_stages: Vec<u32>,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
}

/// Everything a client renders, re-fetched after every event.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    /// Game-level data.
    pub game: GameInfo,
    /// The caller's team.
    pub team: TeamInfo,
    /// The caller.
    pub player_id: Uuid,
    /// The caller's role.
    pub role: PlayerRole,
    /// `null` once every stage is completed.
    pub current_stage: Option<StageView>,
    /// RFC 3339 start of the current stage, for the stage timer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage_started_at: Option<String>,
    /// Finished stages in completion order.
    pub completed_stages: Vec<CompletedStage>,
    /// Whether every stage is completed.
    pub game_complete: bool,
}

impl GameStateResponse {
    /// Snapshot of `team` inside `game` as seen by `player_id`.
    ///
    /// `status` is the effective status the caller computed for this read.
    pub fn build(
        game: &Game,
        team: &Team,
        player_id: Uuid,
        role: PlayerRole,
        status: GameStatus,
    ) -> Self {
        let total_stages = game.total_stages();
        let completed_stages = team
            .results
            .iter()
            .map(|result| {
                let stage = game.stage(result.stage_number);
                CompletedStage {
                    stage_number: result.stage_number,
                    location: stage.map(|s| s.location.clone()).unwrap_or_default(),
                    answer: result.answer.clone(),
                    is_correct: result.is_correct,
                    correct_answer: stage
                        .and_then(|s| s.challenge.question())
                        .map(|q| q.answer.clone()),
                    completed_at: format_system_time(result.completed_at),
                }
            })
            .collect();

        let current_stage = team
            .current_stage_number(total_stages)
            .and_then(|number| game.stage(number))
            .map(|stage| StageView::for_team(stage, team));

        Self {
            game: GameInfo {
                id: game.id,
                name: game.name.clone(),
                status,
                mode: game.mode.as_str().to_owned(),
                has_questions: game.mode.has_questions(),
                supervised: game.supervised,
                timer_enabled: game.timer.is_some(),
                timer_minutes: game.timer.map(|timer| timer.total_minutes),
                stage_timer_minutes: game.timer.and_then(|timer| timer.stage_minutes),
                started_at: game.started_at.map(format_system_time),
                ended_at: game.ended_at.map(format_system_time),
                ends_at: lifecycle::deadline(game).map(format_system_time),
                total_stages,
            },
            team: TeamInfo {
                id: team.id,
                name: team.name.clone(),
                team_secret: team
                    .team_secret
                    .filter(|_| game.mode == GameMode::MathPuzzle),
                unlocked_stages: team.unlocked.iter().copied().collect(),
                players: team.players.iter().map(PlayerSummary::from).collect(),
            },
            player_id,
            role,
            current_stage,
            current_stage_started_at: lifecycle::current_stage_started_at(game, team)
                .map(format_system_time),
            completed_stages,
            game_complete: team.is_complete(total_stages),
        }
    }
}

/// Result of `POST /game/answer`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    /// Whether the answer matched.
    pub is_correct: bool,
    /// Stage answered.
    pub stage_number: u32,
    /// Stage the team moves to, `null` when done.
    pub next_stage: Option<StageView>,
    /// Whether that was the last stage.
    pub game_complete: bool,
    /// Only sent when the answer was wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl AnswerResponse {
    /// Response for `outcome`; `next_stage` is already projected for the team.
    pub fn new(outcome: AnswerOutcome, next_stage: Option<StageView>) -> Self {
        Self {
            is_correct: outcome.is_correct,
            stage_number: outcome.stage_number,
            next_stage,
            game_complete: outcome.game_complete,
            correct_answer: (!outcome.is_correct).then_some(outcome.correct_answer),
        }
    }
}

/// Result of `POST /game/unlock`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    /// Stage unlocked.
    pub stage_number: u32,
    /// Always `true` on success.
    pub unlocked: bool,
    /// Set when the unlock completed the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_complete: Option<bool>,
    /// Stage the team moves to after completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<StageView>,
    /// Set when the unlock completed the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_complete: Option<bool>,
    /// Question revealed by the unlock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl UnlockResponse {
    /// Revealed questions and completed stages answer differently.
    pub fn new(outcome: UnlockOutcome, next_stage: Option<StageView>) -> Self {
        match outcome {
            UnlockOutcome::Revealed {
                stage_number,
                question,
            } => Self {
                stage_number,
                unlocked: true,
                stage_complete: None,
                next_stage: None,
                game_complete: None,
                question: Some(question),
            },
            UnlockOutcome::Completed {
                stage_number,
                game_complete,
                ..
            } => Self {
                stage_number,
                unlocked: true,
                stage_complete: Some(true),
                next_stage,
                game_complete: Some(game_complete),
                question: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::state::game::{Question, StageChallenge};

    fn team() -> Team {
        Team {
            id: Uuid::new_v4(),
            name: "Condors".into(),
            join_token: "condors".into(),
            supervisor_token: None,
            team_secret: None,
            unlocked: BTreeSet::new(),
            players: Vec::new(),
            results: Vec::new(),
        }
    }

    #[test]
    fn locked_stage_hides_its_question() {
        let stage = Stage {
            number: 1,
            location: "Cusco".into(),
            clue: "Main square".into(),
            challenge: StageChallenge::QrQuiz {
                unlock_code: "QR".into(),
                question: Question {
                    prompt: "Which year?".into(),
                    answer: "1651".into(),
                },
            },
        };
        let mut team = team();

        let view = StageView::for_team(&stage, &team);
        assert!(view.locked);
        assert!(view.has_question);
        assert_eq!(view.question, None);

        team.unlocked.insert(1);
        let view = StageView::for_team(&stage, &team);
        assert!(!view.locked);
        assert_eq!(view.question.as_deref(), Some("Which year?"));
    }

    #[test]
    fn correct_answer_is_only_revealed_when_wrong() {
        let outcome = AnswerOutcome {
            stage_number: 1,
            is_correct: true,
            correct_answer: "1651".into(),
            next_stage: Some(2),
            game_complete: false,
        };
        let value = serde_json::to_value(AnswerResponse::new(outcome, None)).unwrap();
        assert!(value.get("correctAnswer").is_none());
        assert_eq!(value["isCorrect"], true);
    }
}
