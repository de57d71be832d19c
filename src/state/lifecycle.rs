//! Game status transitions and lazy timer expiry.
//!
//! There is no background clock: the status of an active game with a timer
//! is recomputed from `started_at` on every read, and the `ended` transition
//! is persisted by whoever observes it first.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::state::game::{Game, GameStatus, Team};

/// Why a game refuses gameplay mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameInactive {
    /// Status is ended, or the timer ran out.
    #[error("game has ended")]
    Ended,
    /// Draft or paused.
    #[error("game is not active")]
    NotActive,
}

/// Instant at which the timer of `game` runs out, if it has one and is running.
pub fn deadline(game: &Game) -> Option<SystemTime> {
    let timer = game.timer?;
    let started_at = game.started_at?;
    started_at.checked_add(Duration::from_secs(u64::from(timer.total_minutes) * 60))
}

/// Whether the timer of an active game has run out.
///
/// Expiry is strict: a game is still playable at exactly its deadline.
pub fn is_expired(game: &Game, now: SystemTime) -> bool {
    game.status == GameStatus::Active && deadline(game).is_some_and(|deadline| now > deadline)
}

/// Status callers should observe, accounting for a timer that ran out.
pub fn effective_status(game: &Game, now: SystemTime) -> GameStatus {
    if is_expired(game, now) {
        GameStatus::Ended
    } else {
        game.status
    }
}

/// Persistable side of [`effective_status`]: move an expired game to `ended`.
///
/// Returns `true` if the game changed.
pub fn expire_if_due(game: &mut Game, now: SystemTime) -> bool {
    if !is_expired(game, now) {
        return false;
    }
    apply_status_change(game, GameStatus::Ended, now);
    true
}

/// Apply an explicit status change following the timestamp rules.
///
/// Any transition is accepted; only the timestamps depend on the target.
pub fn apply_status_change(game: &mut Game, status: GameStatus, now: SystemTime) {
    match status {
        GameStatus::Draft => {
            game.started_at = None;
            game.ended_at = None;
        }
        GameStatus::Active => {
            game.started_at.get_or_insert(now);
        }
        GameStatus::Ended => {
            game.ended_at.get_or_insert(now);
        }
        GameStatus::Paused => {}
    }
    game.status = status;
}

/// Reject gameplay on games that are not (effectively) active.
pub fn ensure_playable(game: &Game, now: SystemTime) -> Result<(), GameInactive> {
    match effective_status(game, now) {
        GameStatus::Active => Ok(()),
        GameStatus::Ended => Err(GameInactive::Ended),
        GameStatus::Draft | GameStatus::Paused => Err(GameInactive::NotActive),
    }
}

/// When the team started its current stage: the last completion, or the game start.
pub fn current_stage_started_at(game: &Game, team: &Team) -> Option<SystemTime> {
    if team.is_complete(game.total_stages()) {
        return None;
    }
    team.results
        .last()
        .map(|result| result.completed_at)
        .or(game.started_at)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use uuid::Uuid;

    use super::*;
    use crate::state::game::{GameMode, TimerSettings};

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    fn game(status: GameStatus, timer_minutes: Option<u32>) -> Game {
        let epoch = SystemTime::UNIX_EPOCH;
        Game {
            id: Uuid::new_v4(),
            revision: 0,
            name: "Incas".into(),
            status,
            mode: GameMode::Classic,
            supervised: false,
            timer: timer_minutes.map(|total_minutes| TimerSettings {
                total_minutes,
                stage_minutes: None,
            }),
            started_at: Some(epoch),
            ended_at: None,
            created_at: epoch,
            updated_at: epoch,
            stages: Vec::new(),
            teams: IndexMap::new(),
        }
    }

    #[test]
    fn active_game_expires_after_its_timer() {
        let game = game(GameStatus::Active, Some(1));
        let now = SystemTime::UNIX_EPOCH + minutes(2);
        assert!(is_expired(&game, now));
        assert_eq!(effective_status(&game, now), GameStatus::Ended);
        assert_eq!(ensure_playable(&game, now), Err(GameInactive::Ended));
    }

    #[test]
    fn expiry_is_strict_at_the_deadline() {
        let game = game(GameStatus::Active, Some(1));
        assert!(!is_expired(&game, SystemTime::UNIX_EPOCH + minutes(1)));
    }

    #[test]
    fn timer_only_fires_from_active() {
        let paused = game(GameStatus::Paused, Some(1));
        let now = SystemTime::UNIX_EPOCH + minutes(5);
        assert_eq!(effective_status(&paused, now), GameStatus::Paused);
        assert_eq!(ensure_playable(&paused, now), Err(GameInactive::NotActive));

        let untimed = game(GameStatus::Active, None);
        assert!(ensure_playable(&untimed, now).is_ok());
    }

    #[test]
    fn expire_if_due_writes_once() {
        let mut game = game(GameStatus::Active, Some(1));
        let now = SystemTime::UNIX_EPOCH + minutes(2);
        assert!(expire_if_due(&mut game, now));
        assert_eq!(game.status, GameStatus::Ended);
        assert_eq!(game.ended_at, Some(now));
        assert!(!expire_if_due(&mut game, now + minutes(1)));
        assert_eq!(game.ended_at, Some(now));
    }

    #[test]
    fn status_table_manages_timestamps() {
        let mut game = game(GameStatus::Draft, None);
        game.started_at = None;
        let t1 = SystemTime::UNIX_EPOCH + minutes(1);
        let t2 = SystemTime::UNIX_EPOCH + minutes(2);

        apply_status_change(&mut game, GameStatus::Active, t1);
        assert_eq!(game.started_at, Some(t1));
        apply_status_change(&mut game, GameStatus::Paused, t2);
        apply_status_change(&mut game, GameStatus::Active, t2);
        assert_eq!(game.started_at, Some(t1));

        apply_status_change(&mut game, GameStatus::Ended, t2);
        assert_eq!(game.ended_at, Some(t2));

        apply_status_change(&mut game, GameStatus::Draft, t2);
        assert_eq!((game.started_at, game.ended_at), (None, None));
    }
}
