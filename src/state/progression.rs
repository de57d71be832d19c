//! Stage progression rules shared by every play mode.
//!
//! The functions here are pure: they validate a submission against a team's
//! progress and apply its effect to the team in place. Persisting the change
//! and notifying subscribers is left to the caller.

use std::time::SystemTime;

use thiserror::Error;

use crate::state::game::{
    GameMode, PlayerRole, Question, Stage, StageChallenge, StageResult, Team,
};

/// Why a submission was refused. Nothing is changed when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The team already has a result for every stage.
    #[error("all stages are already completed")]
    AllStagesComplete,
    /// The current stage is completed by unlocking, not answering.
    #[error("stage {0} has no question to answer")]
    NoQuestion(u32),
    /// The question exists but the stage has not been unlocked yet.
    #[error("stage {0} is locked")]
    StageLocked(u32),
    /// Classic games go straight to the question.
    #[error("this game mode has no unlock step")]
    UnlockNotSupported,
    /// A second unlock of the same stage.
    #[error("stage {0} is already unlocked")]
    AlreadyUnlocked(u32),
    /// Guided games only let the supervisor unlock.
    #[error("only a supervisor can unlock stages in this game")]
    SupervisorRequired,
    /// Well-formed code that does not open the stage.
    #[error("wrong code")]
    WrongCode,
    /// Blank answer or code; the field name is carried along.
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
    /// Math puzzle codes are decimal integers.
    #[error("code must be a number")]
    NonNumericCode,
    /// Math puzzle team created without a secret.
    #[error("team has no secret configured")]
    MissingTeamSecret,
}

/// Result of an accepted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Stage the answer was recorded for.
    pub stage_number: u32,
    /// Whether the submission matched the expected answer.
    pub is_correct: bool,
    /// Expected answer, revealed once the stage is done.
    pub correct_answer: String,
    /// Stage the team moves on to, if any.
    pub next_stage: Option<u32>,
    /// Whether this answer completed the last stage.
    pub game_complete: bool,
}

/// Result of an accepted unlock code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The stage question is now visible and waits for an answer.
    Revealed {
        /// Stage that was unlocked.
        stage_number: u32,
        /// Prompt the team now has to answer.
        question: String,
    },
    /// The stage has no question and was completed by the unlock itself.
    Completed {
        /// Stage that was completed.
        stage_number: u32,
        /// Stage the team moves on to, if any.
        next_stage: Option<u32>,
        /// Whether this was the last stage.
        game_complete: bool,
    },
}

impl UnlockOutcome {
    /// Stage the code applied to.
    pub fn stage_number(&self) -> u32 {
        match self {
            UnlockOutcome::Revealed { stage_number, .. }
            | UnlockOutcome::Completed { stage_number, .. } => *stage_number,
        }
    }
}

/// Answers are compared trimmed and case-insensitively.
pub fn answers_match(submitted: &str, expected: &str) -> bool {
    submitted.trim().to_lowercase() == expected.trim().to_lowercase()
}

/// Code a math puzzle team has to enter for a stage.
pub fn math_code(team_secret: i64, location_number: i64) -> i64 {
    team_secret.saturating_add(location_number)
}

fn current_stage<'a>(stages: &'a [Stage], team: &Team) -> Result<&'a Stage, Rejection> {
    stages
        .get(team.answered_count())
        .ok_or(Rejection::AllStagesComplete)
}

fn record_result(
    stages: &[Stage],
    team: &mut Team,
    stage_number: u32,
    answer: String,
    is_correct: bool,
    now: SystemTime,
) -> (Option<u32>, bool) {
    team.results.push(StageResult {
        stage_number,
        answer,
        is_correct,
        completed_at: now,
    });
    let next_stage = team.current_stage_number(stages.len());
    (next_stage, next_stage.is_none())
}

/// Record an answer for the team's current stage.
///
/// Wrong answers still complete the stage; the result is stored with
/// `is_correct = false` and the team moves on.
pub fn submit_answer(
    stages: &[Stage],
    team: &mut Team,
    answer: &str,
    now: SystemTime,
) -> Result<AnswerOutcome, Rejection> {
    let stage = current_stage(stages, team)?;
    let Question {
        answer: expected, ..
    } = stage
        .challenge
        .question()
        .ok_or(Rejection::NoQuestion(stage.number))?;

    if stage.challenge.requires_unlock() && !team.is_unlocked(stage.number) {
        return Err(Rejection::StageLocked(stage.number));
    }

    let answer = answer.trim();
    if answer.is_empty() {
        return Err(Rejection::EmptyInput("answer"));
    }

    let stage_number = stage.number;
    let correct_answer = expected.clone();
    let is_correct = answers_match(answer, &correct_answer);
    let (next_stage, game_complete) =
        record_result(stages, team, stage_number, answer.to_owned(), is_correct, now);

    Ok(AnswerOutcome {
        stage_number,
        is_correct,
        correct_answer,
        next_stage,
        game_complete,
    })
}

/// Apply an unlock code to the team's current stage.
///
/// Stages without a question are completed by a successful unlock.
pub fn submit_unlock(
    mode: GameMode,
    stages: &[Stage],
    team: &mut Team,
    role: PlayerRole,
    code: &str,
    now: SystemTime,
) -> Result<UnlockOutcome, Rejection> {
    match mode {
        GameMode::Classic => return Err(Rejection::UnlockNotSupported),
        GameMode::Guided { .. } if role != PlayerRole::Supervisor => {
            return Err(Rejection::SupervisorRequired);
        }
        _ => {}
    }

    let stage = current_stage(stages, team)?;
    if team.is_unlocked(stage.number) {
        return Err(Rejection::AlreadyUnlocked(stage.number));
    }

    let code = code.trim();
    match &stage.challenge {
        StageChallenge::Classic { .. } => return Err(Rejection::UnlockNotSupported),
        StageChallenge::QrQuiz { unlock_code, .. } | StageChallenge::QrHunt { unlock_code } => {
            if code.is_empty() {
                return Err(Rejection::EmptyInput("code"));
            }
            if !answers_match(code, unlock_code) {
                return Err(Rejection::WrongCode);
            }
        }
        StageChallenge::MathPuzzle { location_number } => {
            if code.is_empty() {
                return Err(Rejection::EmptyInput("code"));
            }
            let secret = team.team_secret.ok_or(Rejection::MissingTeamSecret)?;
            code.parse::<i64>()
                .map_err(|_| Rejection::NonNumericCode)?;
            // Only the canonical decimal form counts: "059" or "+59" stay wrong.
            if code != math_code(secret, *location_number).to_string() {
                return Err(Rejection::WrongCode);
            }
        }
        // The supervisor confirms the team reached the location; no code to check.
        StageChallenge::Guided { .. } => {}
    }

    let stage_number = stage.number;
    let question = stage.challenge.question().map(|q| q.prompt.clone());
    team.unlocked.insert(stage_number);

    Ok(match question {
        Some(question) => UnlockOutcome::Revealed {
            stage_number,
            question,
        },
        None => {
            let (next_stage, game_complete) =
                record_result(stages, team, stage_number, String::new(), true, now);
            UnlockOutcome::Completed {
                stage_number,
                next_stage,
                game_complete,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use uuid::Uuid;

    use super::*;

    fn question(answer: &str) -> Question {
        Question {
            prompt: format!("what is {answer}?"),
            answer: answer.into(),
        }
    }

    fn stages(challenges: Vec<StageChallenge>) -> Vec<Stage> {
        challenges
            .into_iter()
            .enumerate()
            .map(|(index, challenge)| Stage {
                number: index as u32 + 1,
                location: format!("Spot {}", index + 1),
                clue: "Follow the river".into(),
                challenge,
            })
            .collect()
    }

    fn team(secret: Option<i64>) -> Team {
        Team {
            id: Uuid::new_v4(),
            name: "Condors".into(),
            join_token: "condors".into(),
            supervisor_token: None,
            team_secret: secret,
            unlocked: BTreeSet::new(),
            players: Vec::new(),
            results: Vec::new(),
        }
    }

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    #[test]
    fn classic_answer_matches_loosely_and_advances() {
        let stages = stages(vec![
            StageChallenge::Classic {
                question: question("Machu Picchu"),
            },
            StageChallenge::Classic {
                question: question("1651"),
            },
        ]);
        let mut team = team(None);

        let outcome = submit_answer(&stages, &mut team, "  machu PICCHU ", now()).unwrap();
        assert!(outcome.is_correct);
        assert_eq!(outcome.next_stage, Some(2));
        assert!(!outcome.game_complete);
        assert_eq!(team.results[0].answer, "machu PICCHU");
    }

    #[test]
    fn wrong_answer_still_completes_stage() {
        let stages = stages(vec![StageChallenge::Classic {
            question: question("1651"),
        }]);
        let mut team = team(None);

        let outcome = submit_answer(&stages, &mut team, "1652", now()).unwrap();
        assert!(!outcome.is_correct);
        assert_eq!(outcome.correct_answer, "1651");
        assert!(outcome.game_complete);
        assert_eq!(
            submit_answer(&stages, &mut team, "1651", now()),
            Err(Rejection::AllStagesComplete)
        );
    }

    #[test]
    fn empty_answer_is_rejected_without_change() {
        let stages = stages(vec![StageChallenge::Classic {
            question: question("x"),
        }]);
        let mut team = team(None);
        assert_eq!(
            submit_answer(&stages, &mut team, "   ", now()),
            Err(Rejection::EmptyInput("answer"))
        );
        assert!(team.results.is_empty());
    }

    #[test]
    fn qr_quiz_requires_unlock_before_answer() {
        let stages = stages(vec![StageChallenge::QrQuiz {
            unlock_code: "QR-CUSCO".into(),
            question: question("Inti"),
        }]);
        let mut team = team(None);

        assert_eq!(
            submit_answer(&stages, &mut team, "Inti", now()),
            Err(Rejection::StageLocked(1))
        );
        assert_eq!(
            submit_unlock(GameMode::QrQuiz, &stages, &mut team, PlayerRole::Player, "nope", now()),
            Err(Rejection::WrongCode)
        );

        let outcome = submit_unlock(
            GameMode::QrQuiz,
            &stages,
            &mut team,
            PlayerRole::Player,
            "qr-cusco",
            now(),
        )
        .unwrap();
        assert_eq!(
            outcome,
            UnlockOutcome::Revealed {
                stage_number: 1,
                question: "what is Inti?".into()
            }
        );
        assert_eq!(
            submit_unlock(GameMode::QrQuiz, &stages, &mut team, PlayerRole::Player, "QR-CUSCO", now()),
            Err(Rejection::AlreadyUnlocked(1))
        );
        assert!(submit_answer(&stages, &mut team, "inti", now()).unwrap().is_correct);
    }

    #[test]
    fn qr_hunt_unlock_completes_stage() {
        let stages = stages(vec![
            StageChallenge::QrHunt {
                unlock_code: "A".into(),
            },
            StageChallenge::QrHunt {
                unlock_code: "B".into(),
            },
        ]);
        let mut team = team(None);

        let first =
            submit_unlock(GameMode::QrHunt, &stages, &mut team, PlayerRole::Player, "A", now())
                .unwrap();
        assert_eq!(
            first,
            UnlockOutcome::Completed {
                stage_number: 1,
                next_stage: Some(2),
                game_complete: false
            }
        );
        assert_eq!(
            submit_answer(&stages, &mut team, "anything", now()),
            Err(Rejection::NoQuestion(2))
        );

        let second =
            submit_unlock(GameMode::QrHunt, &stages, &mut team, PlayerRole::Player, "B", now())
                .unwrap();
        assert_eq!(
            second,
            UnlockOutcome::Completed {
                stage_number: 2,
                next_stage: None,
                game_complete: true
            }
        );
        assert!(team.results.iter().all(|r| r.is_correct && r.answer.is_empty()));
    }

    #[test]
    fn math_puzzle_checks_secret_plus_location() {
        let stages = stages(vec![StageChallenge::MathPuzzle { location_number: 17 }]);
        let mut team = team(Some(42));

        assert_eq!(
            submit_unlock(GameMode::MathPuzzle, &stages, &mut team, PlayerRole::Player, "abc", now()),
            Err(Rejection::NonNumericCode)
        );
        for wrong in ["58", "059", "+59", "0059"] {
            assert_eq!(
                submit_unlock(GameMode::MathPuzzle, &stages, &mut team, PlayerRole::Player, wrong, now()),
                Err(Rejection::WrongCode),
                "{wrong} must not unlock"
            );
        }
        assert!(team.unlocked.is_empty());
        let outcome =
            submit_unlock(GameMode::MathPuzzle, &stages, &mut team, PlayerRole::Player, " 59 ", now())
                .unwrap();
        assert_eq!(outcome.stage_number(), 1);
        assert!(team.is_complete(stages.len()));
    }

    #[test]
    fn guided_unlock_requires_supervisor() {
        let stages = stages(vec![StageChallenge::Guided {
            question: Some(question("Llama")),
        }]);
        let mode = GameMode::Guided {
            has_questions: true,
        };
        let mut team = team(None);

        assert_eq!(
            submit_unlock(mode, &stages, &mut team, PlayerRole::Player, "", now()),
            Err(Rejection::SupervisorRequired)
        );
        let outcome =
            submit_unlock(mode, &stages, &mut team, PlayerRole::Supervisor, "", now()).unwrap();
        assert!(matches!(outcome, UnlockOutcome::Revealed { .. }));
        assert!(submit_answer(&stages, &mut team, "llama", now()).unwrap().game_complete);
    }

    #[test]
    fn classic_has_no_unlock_step() {
        let stages = stages(vec![StageChallenge::Classic {
            question: question("x"),
        }]);
        let mut team = team(None);
        assert_eq!(
            submit_unlock(GameMode::Classic, &stages, &mut team, PlayerRole::Player, "x", now()),
            Err(Rejection::UnlockNotSupported)
        );
    }
}
