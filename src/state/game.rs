//! In-memory game aggregate and the conversions from stored entities.

use std::{collections::BTreeSet, fmt, str::FromStr, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::{
    migration::CURRENT_SCHEMA_VERSION,
    models::{
        GameEntity, PlayerEntity, PlayerSessionEntity, StageEntity, StageResultEntity, TeamEntity,
    },
};

/// Lifecycle status stored on a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Being prepared; players cannot join yet.
    Draft,
    /// Running; teams progress through stages.
    Active,
    /// Temporarily frozen by the organiser.
    Paused,
    /// Finished, either explicitly or because the timer ran out.
    Ended,
}

impl GameStatus {
    /// Tag used in persisted documents.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Draft => "draft",
            GameStatus::Active => "active",
            GameStatus::Paused => "paused",
            GameStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = LoadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(GameStatus::Draft),
            "active" => Ok(GameStatus::Active),
            "paused" => Ok(GameStatus::Paused),
            "ended" => Ok(GameStatus::Ended),
            other => Err(LoadError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Play mode of a game, deciding how stages are unlocked and answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// Every stage shows its question right away.
    Classic,
    /// A QR code unlocks the question of each stage.
    QrQuiz,
    /// A QR code completes each stage; there are no questions.
    QrHunt,
    /// A code computed from the team secret and the location number completes each stage.
    MathPuzzle,
    /// A supervisor unlocks each stage on site.
    Guided {
        /// Whether unlocked stages still need to be answered.
        has_questions: bool,
    },
}

impl GameMode {
    /// Tag used in persisted documents and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Classic => "classic",
            GameMode::QrQuiz => "qr_quiz",
            GameMode::QrHunt => "qr_hunt",
            GameMode::MathPuzzle => "math_puzzle",
            GameMode::Guided { .. } => "guided",
        }
    }

    /// Parse a mode tag; `has_questions` only matters for guided games.
    pub fn parse(tag: &str, has_questions: bool) -> Result<Self, LoadError> {
        match tag {
            "classic" => Ok(GameMode::Classic),
            "qr_quiz" => Ok(GameMode::QrQuiz),
            "qr_hunt" => Ok(GameMode::QrHunt),
            "math_puzzle" => Ok(GameMode::MathPuzzle),
            "guided" => Ok(GameMode::Guided { has_questions }),
            other => Err(LoadError::UnknownMode(other.to_owned())),
        }
    }

    /// Guided flag as stored on the document.
    pub fn has_questions(self) -> bool {
        matches!(self, GameMode::Guided { has_questions: true })
    }
}

/// Role a player holds within its team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    /// Regular team member.
    Player,
    /// Staff member allowed to unlock stages in guided games.
    Supervisor,
}

impl PlayerRole {
    /// Tag used in persisted documents.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerRole::Player => "player",
            PlayerRole::Supervisor => "supervisor",
        }
    }
}

impl FromStr for PlayerRole {
    type Err = LoadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "player" | "" => Ok(PlayerRole::Player),
            "supervisor" => Ok(PlayerRole::Supervisor),
            other => Err(LoadError::UnknownRole(other.to_owned())),
        }
    }
}

/// Timer configuration; its presence means the timer is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Total playing time once the game becomes active.
    pub total_minutes: u32,
    /// Indicative time per stage, only used by clients.
    pub stage_minutes: Option<u32>,
}

/// Question attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Text shown to the team.
    pub prompt: String,
    /// Expected answer, compared loosely.
    pub answer: String,
}

/// Mode-specific content of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageChallenge {
    /// Answer straight away.
    Classic {
        /// Question shown with the clue.
        question: Question,
    },
    /// Scan the QR code on site to reveal the question.
    QrQuiz {
        /// Code printed at the location.
        unlock_code: String,
        /// Question revealed by the code.
        question: Question,
    },
    /// Scanning the code completes the stage.
    QrHunt {
        /// Code printed at the location.
        unlock_code: String,
    },
    /// Enter `team secret + location number` to complete the stage.
    MathPuzzle {
        /// Number displayed at the location.
        location_number: i64,
    },
    /// The supervisor unlocks the stage once the team is there.
    Guided {
        /// Asked after the unlock when the game has questions.
        question: Option<Question>,
    },
}

impl StageChallenge {
    /// Question of the stage, if the mode has one.
    pub fn question(&self) -> Option<&Question> {
        match self {
            StageChallenge::Classic { question } | StageChallenge::QrQuiz { question, .. } => {
                Some(question)
            }
            StageChallenge::Guided { question } => question.as_ref(),
            StageChallenge::QrHunt { .. } | StageChallenge::MathPuzzle { .. } => None,
        }
    }

    /// Whether the stage must be unlocked before it can be played.
    pub fn requires_unlock(&self) -> bool {
        !matches!(self, StageChallenge::Classic { .. })
    }
}

/// One step of the scenario, copied into the game at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// 1-based position in the scenario.
    pub number: u32,
    /// Place the team has to reach.
    pub location: String,
    /// Hint leading to the location.
    pub clue: String,
    /// What the team does once there.
    pub challenge: StageChallenge,
}

/// Outcome recorded when a team finishes a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    /// Stage this result completes.
    pub stage_number: u32,
    /// Empty for stages completed by an unlock.
    pub answer: String,
    /// Whether the answer matched; always true for unlock completions.
    pub is_correct: bool,
    /// When the stage was completed.
    pub completed_at: SystemTime,
}

/// Player registered through the join flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable player identifier.
    pub id: Uuid,
    /// Display name given at join.
    pub name: String,
    /// Player or supervisor.
    pub role: PlayerRole,
    /// Bearer token issued at join.
    pub session_token: String,
    /// When the player joined.
    pub joined_at: SystemTime,
}

impl Player {
    /// Create a player with a fresh identifier.
    pub fn new(name: String, role: PlayerRole, session_token: String, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            role,
            session_token,
            joined_at: now,
        }
    }
}

/// Team progressing through the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable team identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Token players use to join.
    pub join_token: String,
    /// Token granting the supervisor role on supervised games.
    pub supervisor_token: Option<String>,
    /// Secret number of math puzzle teams.
    pub team_secret: Option<i64>,
    /// Stage numbers unlocked so far.
    pub unlocked: BTreeSet<u32>,
    /// Players in join order.
    pub players: Vec<Player>,
    /// One result per completed stage, in stage order.
    pub results: Vec<StageResult>,
}

impl Team {
    /// Number of stages already completed; doubles as the stage pointer.
    pub fn answered_count(&self) -> usize {
        self.results.len()
    }

    /// Number of the stage the team is on, or `None` once every stage is done.
    pub fn current_stage_number(&self, total_stages: usize) -> Option<u32> {
        let answered = self.answered_count();
        (answered < total_stages).then(|| answered as u32 + 1)
    }

    /// Whether every stage has a result.
    pub fn is_complete(&self, total_stages: usize) -> bool {
        self.answered_count() >= total_stages
    }

    /// Whether `stage_number` has been unlocked.
    pub fn is_unlocked(&self, stage_number: u32) -> bool {
        self.unlocked.contains(&stage_number)
    }
}

/// Runtime view of a game document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Game identifier.
    pub id: Uuid,
    /// Revision of the document this value was loaded from.
    pub revision: u64,
    /// Display name.
    pub name: String,
    /// Stored status; see [`crate::state::lifecycle::effective_status`].
    pub status: GameStatus,
    /// Play mode shared by every stage.
    pub mode: GameMode,
    /// Whether supervisor tokens are honoured.
    pub supervised: bool,
    /// Time limit, when enabled.
    pub timer: Option<TimerSettings>,
    /// Set when the game first becomes active.
    pub started_at: Option<SystemTime>,
    /// Set when the game ends.
    pub ended_at: Option<SystemTime>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last persisted mutation.
    pub updated_at: SystemTime,
    /// Scenario snapshot, ordered by stage number.
    pub stages: Vec<Stage>,
    /// Teams keyed by id, in creation order.
    pub teams: IndexMap<Uuid, Team>,
}

impl Game {
    /// Number of stages in the scenario snapshot.
    pub fn total_stages(&self) -> usize {
        self.stages.len()
    }

    /// Stage with the given 1-based number.
    pub fn stage(&self, number: u32) -> Option<&Stage> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.stages.get(index)
    }

    /// Find the team a join token belongs to together with the role it grants.
    ///
    /// Supervisor tokens are only honoured on supervised games.
    pub fn team_by_join_token_mut(&mut self, token: &str) -> Option<(&mut Team, PlayerRole)> {
        let supervised = self.supervised;
        self.teams.values_mut().find_map(|team| {
            if team.join_token == token {
                Some((team, PlayerRole::Player))
            } else if supervised && team.supervisor_token.as_deref() == Some(token) {
                Some((team, PlayerRole::Supervisor))
            } else {
                None
            }
        })
    }
}

/// Token binding resolved from the session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSession {
    /// Bearer token.
    pub token: String,
    /// Player the token was issued to.
    pub player_id: Uuid,
    /// Team of that player.
    pub team_id: Uuid,
    /// Game of that team.
    pub game_id: Uuid,
    /// Role granted at join.
    pub role: PlayerRole,
}

/// Reasons a stored document cannot be turned into a [`Game`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Status string not recognised.
    #[error("unknown game status `{0}`")]
    UnknownStatus(String),
    /// Mode string not recognised.
    #[error("unknown game mode `{0}`")]
    UnknownMode(String),
    /// Role string not recognised.
    #[error("unknown player role `{0}`")]
    UnknownRole(String),
    /// Stages must be numbered 1, 2, 3...
    #[error("stage numbers must be contiguous from 1 (found {found} at position {position})")]
    StageNumbering {
        /// Index in the stage list.
        position: usize,
        /// Number stored at that index.
        found: u32,
    },
    /// A stage lacks a field its mode needs.
    #[error("stage {stage} is missing `{field}` required by mode `{mode}`")]
    StageField {
        /// Offending stage.
        stage: u32,
        /// Missing field.
        field: &'static str,
        /// Mode requiring it.
        mode: &'static str,
    },
    /// Math puzzle team without a secret.
    #[error("team `{0}` has no secret but the game is a math puzzle")]
    MissingTeamSecret(Uuid),
    /// Timer flag set without minutes.
    #[error("timer is enabled but no duration is set")]
    MissingTimerDuration,
}

impl TryFrom<GameEntity> for Game {
    type Error = LoadError;

    fn try_from(entity: GameEntity) -> Result<Self, Self::Error> {
        let status = entity.status.parse::<GameStatus>()?;
        let mode = GameMode::parse(&entity.mode, entity.has_questions)?;

        let timer = if entity.timer_enabled.unwrap_or(false) {
            let total_minutes = entity
                .timer_minutes
                .filter(|minutes| *minutes > 0)
                .ok_or(LoadError::MissingTimerDuration)?;
            Some(TimerSettings {
                total_minutes,
                stage_minutes: entity.stage_timer_minutes,
            })
        } else {
            None
        };

        let stages = entity
            .stages
            .into_iter()
            .enumerate()
            .map(|(position, stage)| {
                let expected = position as u32 + 1;
                if stage.number != expected {
                    return Err(LoadError::StageNumbering {
                        position,
                        found: stage.number,
                    });
                }
                stage_from_entity(stage, mode)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let teams = entity
            .teams
            .into_iter()
            .map(|team| {
                if mode == GameMode::MathPuzzle && team.team_secret.is_none() {
                    return Err(LoadError::MissingTeamSecret(team.id));
                }
                let team = Team::try_from(team)?;
                Ok((team.id, team))
            })
            .collect::<Result<IndexMap<_, _>, LoadError>>()?;

        Ok(Self {
            id: entity.id,
            revision: entity.revision,
            name: entity.name,
            status,
            mode,
            supervised: entity.supervised,
            timer,
            started_at: entity.started_at,
            ended_at: entity.ended_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            stages,
            teams,
        })
    }
}

fn stage_from_entity(stage: StageEntity, mode: GameMode) -> Result<Stage, LoadError> {
    let number = stage.number;
    let missing = |field: &'static str| LoadError::StageField {
        stage: number,
        field,
        mode: mode.as_str(),
    };

    let question = match (stage.question, stage.answer) {
        (Some(prompt), Some(answer)) => Some(Question { prompt, answer }),
        (Some(_), None) => return Err(missing("answer")),
        _ => None,
    };

    let challenge = match mode {
        GameMode::Classic => StageChallenge::Classic {
            question: question.ok_or_else(|| missing("question"))?,
        },
        GameMode::QrQuiz => StageChallenge::QrQuiz {
            unlock_code: stage.unlock_code.ok_or_else(|| missing("unlock_code"))?,
            question: question.ok_or_else(|| missing("question"))?,
        },
        GameMode::QrHunt => StageChallenge::QrHunt {
            unlock_code: stage.unlock_code.ok_or_else(|| missing("unlock_code"))?,
        },
        GameMode::MathPuzzle => StageChallenge::MathPuzzle {
            location_number: stage
                .location_number
                .ok_or_else(|| missing("location_number"))?,
        },
        GameMode::Guided { has_questions } => {
            if has_questions && question.is_none() {
                return Err(missing("question"));
            }
            StageChallenge::Guided {
                question: if has_questions { question } else { None },
            }
        }
    };

    Ok(Stage {
        number,
        location: stage.location,
        clue: stage.clue,
        challenge,
    })
}

impl TryFrom<TeamEntity> for Team {
    type Error = LoadError;

    fn try_from(value: TeamEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.name,
            join_token: value.join_token,
            supervisor_token: value.supervisor_token,
            team_secret: value.team_secret,
            unlocked: value.unlocked_stages.into_iter().collect(),
            players: value
                .players
                .into_iter()
                .map(Player::try_from)
                .collect::<Result<_, _>>()?,
            results: value.results.into_iter().map(Into::into).collect(),
        })
    }
}

impl TryFrom<PlayerEntity> for Player {
    type Error = LoadError;

    fn try_from(value: PlayerEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.name,
            role: value.role.parse()?,
            session_token: value.session_token,
            joined_at: value.joined_at,
        })
    }
}

impl From<StageResultEntity> for StageResult {
    fn from(value: StageResultEntity) -> Self {
        Self {
            stage_number: value.stage_number,
            answer: value.answer,
            is_correct: value.is_correct,
            completed_at: value.completed_at,
        }
    }
}

impl TryFrom<PlayerSessionEntity> for PlayerSession {
    type Error = LoadError;

    fn try_from(value: PlayerSessionEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            token: value.token,
            player_id: value.player_id,
            team_id: value.team_id,
            game_id: value.game_id,
            role: value.role.parse()?,
        })
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.id,
            schema_version: CURRENT_SCHEMA_VERSION,
            revision: value.revision,
            name: value.name,
            status: value.status.as_str().to_owned(),
            mode: value.mode.as_str().to_owned(),
            has_questions: value.mode.has_questions(),
            supervised: value.supervised,
            timer_enabled: Some(value.timer.is_some()),
            timer_minutes: value.timer.map(|timer| timer.total_minutes),
            stage_timer_minutes: value.timer.and_then(|timer| timer.stage_minutes),
            started_at: value.started_at,
            ended_at: value.ended_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
            stages: value.stages.into_iter().map(Into::into).collect(),
            teams: value.teams.into_values().map(Into::into).collect(),
        }
    }
}

impl From<Stage> for StageEntity {
    fn from(value: Stage) -> Self {
        let mut entity = StageEntity {
            number: value.number,
            location: value.location,
            clue: value.clue,
            question: None,
            answer: None,
            unlock_code: None,
            location_number: None,
        };

        let question = match value.challenge {
            StageChallenge::Classic { question } => Some(question),
            StageChallenge::QrQuiz {
                unlock_code,
                question,
            } => {
                entity.unlock_code = Some(unlock_code);
                Some(question)
            }
            StageChallenge::QrHunt { unlock_code } => {
                entity.unlock_code = Some(unlock_code);
                None
            }
            StageChallenge::MathPuzzle { location_number } => {
                entity.location_number = Some(location_number);
                None
            }
            StageChallenge::Guided { question } => question,
        };

        if let Some(Question { prompt, answer }) = question {
            entity.question = Some(prompt);
            entity.answer = Some(answer);
        }

        entity
    }
}

impl From<Team> for TeamEntity {
    fn from(value: Team) -> Self {
        Self {
            id: value.id,
            name: value.name,
            join_token: value.join_token,
            supervisor_token: value.supervisor_token,
            team_secret: value.team_secret,
            unlocked_stages: value.unlocked.into_iter().collect(),
            players: value.players.into_iter().map(Into::into).collect(),
            results: value.results.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            role: value.role.as_str().to_owned(),
            session_token: value.session_token,
            joined_at: value.joined_at,
        }
    }
}

impl From<StageResult> for StageResultEntity {
    fn from(value: StageResult) -> Self {
        Self {
            stage_number: value.stage_number,
            answer: value.answer,
            is_correct: value.is_correct,
            completed_at: value.completed_at,
        }
    }
}
