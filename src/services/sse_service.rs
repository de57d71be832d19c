use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::{SharedState, broker::Subscription, game::PlayerSession},
};

/// SSE event name of the handshake frame.
pub const HANDSHAKE_EVENT: &str = "handshake";
/// SSE event name of every broker notification.
pub const STATE_EVENT: &str = "state";

/// Register the session's team with the broker and describe the connection.
pub async fn subscribe_team(
    state: &SharedState,
    session: &PlayerSession,
) -> (Subscription, Handshake) {
    let subscription = state.broker().subscribe(session.team_id);
    let handshake = Handshake {
        game_id: session.game_id,
        team_id: session.team_id,
        player_id: session.player_id,
        degraded: state.is_degraded().await,
    };
    info!(
        game_id = %session.game_id,
        team_id = %session.team_id,
        player_id = %session.player_id,
        "team SSE stream connected"
    );
    (subscription, handshake)
}

fn to_event(frame: ServerEvent) -> Event {
    let event = Event::default().data(frame.data);
    match frame.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Turn a team subscription into an SSE response.
///
/// The stream owns the subscription: when the client goes away axum drops the
/// stream and the subscriber is removed from the broker.
pub fn to_sse_stream(
    mut subscription: Subscription,
    handshake: Handshake,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        match ServerEvent::json(Some(HANDSHAKE_EVENT.to_owned()), &handshake) {
            Ok(frame) => yield Ok(to_event(frame)),
            Err(err) => warn!(error = %err, "failed to encode SSE handshake"),
        }

        while let Some(team_event) = subscription.next().await {
            match ServerEvent::json(Some(STATE_EVENT.to_owned()), &team_event) {
                Ok(frame) => yield Ok(to_event(frame)),
                Err(err) => warn!(error = %err, "failed to encode team event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::sse::TeamEvent,
        state::{AppState, game::PlayerRole},
    };

    fn session() -> PlayerSession {
        PlayerSession {
            token: "t".into(),
            player_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            role: PlayerRole::Player,
        }
    }

    #[tokio::test]
    async fn subscription_lives_as_long_as_the_stream() {
        let state: SharedState = AppState::new(AppConfig::default());
        let session = session();

        let (subscription, handshake) = subscribe_team(&state, &session).await;
        assert!(handshake.degraded);
        assert_eq!(state.broker().subscriber_count(session.team_id), 1);

        let sse = to_sse_stream(subscription, handshake, state.config().keep_alive);
        state.publish(TeamEvent::stage_completed(session.game_id, session.team_id, 1));
        drop(sse);
        assert_eq!(state.broker().subscriber_count(session.team_id), 0);
    }

    #[tokio::test]
    async fn handshake_frame_precedes_published_state_frames() {
        let state: SharedState = AppState::new(AppConfig::default());
        let session = session();
        let (subscription, handshake) = subscribe_team(&state, &session).await;
        let mut body = to_sse_stream(subscription, handshake, Duration::from_secs(60))
            .into_response()
            .into_body()
            .into_data_stream();

        state.publish(TeamEvent::stage_completed(session.game_id, session.team_id, 2));

        let mut frames: Vec<String> = Vec::new();
        while !frames.iter().any(|frame| frame.contains("event: state")) {
            let chunk = tokio::time::timeout(Duration::from_secs(1), body.next())
                .await
                .expect("frame within a second")
                .expect("stream still open")
                .expect("readable chunk");
            let text = String::from_utf8(chunk.to_vec()).unwrap();
            frames.extend(
                text.split("\n\n")
                    .filter(|frame| !frame.is_empty())
                    .map(str::to_owned),
            );
        }

        assert!(frames[0].contains("event: handshake"));
        assert!(frames[0].contains(&session.player_id.to_string()));
        let state_frame = frames
            .iter()
            .find(|frame| frame.contains("event: state"))
            .unwrap();
        assert!(state_frame.contains(r#""type":"stage_completed""#));
        assert!(state_frame.contains(r#""stageNumber":2"#));
        assert!(state_frame.contains(&session.team_id.to_string()));
    }
}
