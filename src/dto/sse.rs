use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::game::GameStatus;

#[derive(Clone, Debug)]
/// Frame written to an SSE connection.
pub struct ServerEvent {
    /// SSE `event:` name; unnamed frames are plain messages.
    pub event: Option<String>,
    /// Serialised JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Kind of change announced to a team.
pub enum TeamEventKind {
    /// A stage question was revealed by an unlock.
    StageUnlocked,
    /// A stage got its result, by answer or by unlock.
    StageCompleted,
    /// Someone joined the team.
    PlayerJoined,
    /// The game changed status, including timer expiry.
    GameStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Notification published to the subscribers of one team.
///
/// Clients treat it as a hint and re-fetch the full state.
pub struct TeamEvent {
    /// What happened; serialised as `type`.
    #[serde(rename = "type")]
    pub kind: TeamEventKind,
    /// Game the team plays in.
    pub game_id: Uuid,
    /// Team whose subscribers receive the event.
    pub team_id: Uuid,
    /// Stage concerned by unlock and completion events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_number: Option<u32>,
    /// New status for `game_status` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
    /// Player that joined, for `player_joined` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<Uuid>,
}

impl TeamEvent {
    fn new(kind: TeamEventKind, game_id: Uuid, team_id: Uuid) -> Self {
        Self {
            kind,
            game_id,
            team_id,
            stage_number: None,
            status: None,
            player_id: None,
        }
    }

    /// A stage question became visible.
    pub fn stage_unlocked(game_id: Uuid, team_id: Uuid, stage_number: u32) -> Self {
        Self {
            stage_number: Some(stage_number),
            ..Self::new(TeamEventKind::StageUnlocked, game_id, team_id)
        }
    }

    /// A stage received its result.
    pub fn stage_completed(game_id: Uuid, team_id: Uuid, stage_number: u32) -> Self {
        Self {
            stage_number: Some(stage_number),
            ..Self::new(TeamEventKind::StageCompleted, game_id, team_id)
        }
    }

    /// A player joined the team.
    pub fn player_joined(game_id: Uuid, team_id: Uuid, player_id: Uuid) -> Self {
        Self {
            player_id: Some(player_id),
            ..Self::new(TeamEventKind::PlayerJoined, game_id, team_id)
        }
    }

    /// The game status changed.
    pub fn game_status(game_id: Uuid, team_id: Uuid, status: GameStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::new(TeamEventKind::GameStatus, game_id, team_id)
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Game of the connected session.
    pub game_id: Uuid,
    /// Team whose events the stream carries.
    pub team_id: Uuid,
    /// Player the session token belongs to.
    pub player_id: Uuid,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_event_serializes_in_camel_case_without_empty_fields() {
        let game_id = Uuid::nil();
        let team_id = Uuid::nil();
        let value =
            serde_json::to_value(TeamEvent::stage_completed(game_id, team_id, 2)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "stage_completed",
                "gameId": game_id,
                "teamId": team_id,
                "stageNumber": 2,
            })
        );
    }

    #[test]
    fn game_status_event_carries_status() {
        let event = TeamEvent::game_status(Uuid::nil(), Uuid::nil(), GameStatus::Ended);
        let frame = ServerEvent::json(Some("state".to_owned()), &event).unwrap();
        assert_eq!(frame.event.as_deref(), Some("state"));
        assert!(frame.data.contains(r#""status":"ended""#));
    }
}
