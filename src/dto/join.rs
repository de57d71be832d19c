use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::{validate_join_token, validate_not_blank},
    state::game::PlayerRole,
};

/// Join a team with its player or supervisor token.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Team join token, or the supervisor token of a supervised team.
    #[serde(alias = "joinOrSupervisorToken")]
    #[validate(custom(function = "validate_join_token"))]
    pub join_token: String,
    /// Display name shown to the rest of the team.
    #[validate(
        length(min = 1, max = 40, message = "player name must be 1 to 40 characters"),
        custom(function = "validate_not_blank")
    )]
    pub player_name: String,
}

/// Session issued to a freshly joined player.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Bearer token for every subsequent request.
    pub session_token: String,
    /// Identifier of the new player.
    pub player_id: Uuid,
    /// Team the player joined.
    pub team_id: Uuid,
    /// Display name of that team.
    pub team_name: String,
    /// Game the team belongs to.
    pub game_id: Uuid,
    /// `supervisor` when joined with a supervisor token.
    pub role: PlayerRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_long_token_field_name() {
        let request: JoinRequest = serde_json::from_str(
            r#"{"joinOrSupervisorToken": "incas-2025", "playerName": "Ana"}"#,
        )
        .unwrap();
        assert_eq!(request.join_token, "incas-2025");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_player_name_is_invalid() {
        let request = JoinRequest {
            join_token: "incas-2025".into(),
            player_name: "   ".into(),
        };
        assert!(request.validate().is_err());
    }
}
