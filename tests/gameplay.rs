use std::time::{Duration, SystemTime};

use axum::http::StatusCode;
use serde_json::json;
use trail_quest_back::state::game::TimerSettings;
use uuid::Uuid;

mod common;

use common::{call, create_test_app, join};

const DEMO_ANSWERS: [&str; 4] = ["1651", "inti", " 3 ", "INTIHUATANA"];

#[tokio::test]
async fn demo_game_can_be_played_to_completion() {
    let (app, _state) = create_test_app().await;
    let joined = join(&app, "incas-2025", "Ana").await;
    assert_eq!(joined["role"], "player");
    assert_eq!(joined["teamName"], "Incas");
    let token = joined["sessionToken"].as_str().unwrap().to_owned();

    let (status, snapshot) = call(&app, "GET", "/game/state", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["game"]["status"], "active");
    assert_eq!(snapshot["currentStage"]["stageNumber"], 1);
    assert_eq!(snapshot["currentStage"]["locked"], false);
    assert!(snapshot["currentStage"]["question"].is_string());

    let (status, first) = call(
        &app,
        "POST",
        "/game/answer",
        Some(&token),
        Some(json!({ "answer": DEMO_ANSWERS[0] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["isCorrect"], true);
    assert_eq!(first["stageNumber"], 1);
    assert_eq!(first["nextStage"]["stageNumber"], 2);
    assert_eq!(first["gameComplete"], false);
    assert!(first.get("correctAnswer").is_none());

    let mut last = first;
    for answer in &DEMO_ANSWERS[1..] {
        let (status, body) = call(
            &app,
            "POST",
            "/game/answer",
            Some(&token),
            Some(json!({ "answer": answer })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["isCorrect"], true);
        last = body;
    }
    assert_eq!(last["gameComplete"], true);
    assert!(last["nextStage"].is_null());

    let (_, snapshot) = call(&app, "GET", "/game/state", Some(&token), None).await;
    assert!(snapshot["currentStage"].is_null());
    assert_eq!(snapshot["gameComplete"], true);
    assert_eq!(snapshot["completedStages"].as_array().unwrap().len(), 4);

    let (status, _) = call(
        &app,
        "POST",
        "/game/answer",
        Some(&token),
        Some(json!({ "answer": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_answer_still_advances_and_reveals_the_solution() {
    let (app, _state) = create_test_app().await;
    let joined = join(&app, "incas-2025", "Luis").await;
    let token = joined["sessionToken"].as_str().unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/game/answer",
        Some(token),
        Some(json!({ "answer": "1492" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCorrect"], false);
    assert_eq!(body["correctAnswer"], "1651");
    assert_eq!(body["nextStage"]["stageNumber"], 2);

    let (status, _) = call(
        &app,
        "POST",
        "/game/answer",
        Some(token),
        Some(json!({ "answer": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn players_of_a_team_share_progress() {
    let (app, _state) = create_test_app().await;
    let first = join(&app, "incas-2025", "Ana").await;
    let second = join(&app, "incas-2025", "Luis").await;
    assert_eq!(first["teamId"], second["teamId"]);
    assert_ne!(first["sessionToken"], second["sessionToken"]);

    call(
        &app,
        "POST",
        "/game/answer",
        first["sessionToken"].as_str(),
        Some(json!({ "answer": "1651" })),
    )
    .await;

    let (_, snapshot) = call(&app, "GET", "/game/state", second["sessionToken"].as_str(), None).await;
    assert_eq!(snapshot["currentStage"]["stageNumber"], 2);
    assert_eq!(snapshot["team"]["players"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn session_token_is_required() {
    let (app, _state) = create_test_app().await;

    let (status, _) = call(&app, "GET", "/game/state", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", "/game/state", Some("not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", "/game/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn join_rejects_unknown_tokens_and_blank_names() {
    let (app, _state) = create_test_app().await;

    let (status, _) = call(
        &app,
        "POST",
        "/join",
        None,
        Some(json!({ "joinToken": "nobody-has-this", "playerName": "Ana" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "POST",
        "/join",
        None,
        Some(json!({ "joinToken": "incas-2025", "playerName": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_timer_ends_the_game_on_next_read() {
    let (app, state) = create_test_app().await;
    let joined = join(&app, "incas-2025", "Ana").await;
    let token = joined["sessionToken"].as_str().unwrap();
    let game_id: Uuid = joined["gameId"].as_str().unwrap().parse().unwrap();

    let store = state.game_store().await.unwrap();
    state
        .documents()
        .modify(store.as_ref(), game_id, |game| {
            game.timer = Some(TimerSettings {
                total_minutes: 1,
                stage_minutes: None,
            });
            game.started_at = Some(SystemTime::now() - Duration::from_secs(120));
            Ok::<_, ()>(())
        })
        .await
        .unwrap();

    let (status, snapshot) = call(&app, "GET", "/game/state", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["game"]["status"], "ended");
    assert!(snapshot["game"]["endedAt"].is_string());

    let (status, body) = call(
        &app,
        "POST",
        "/game/answer",
        Some(token),
        Some(json!({ "answer": "1651" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
    assert!(body["message"].as_str().unwrap().contains("game has ended"));
}

#[tokio::test]
async fn join_is_refused_once_the_timer_ran_out() {
    let (app, state) = create_test_app().await;
    let store = state.game_store().await.unwrap();
    let game_id = store
        .find_game_by_token("incas-2025".into())
        .await
        .unwrap()
        .unwrap();
    state
        .documents()
        .modify(store.as_ref(), game_id, |game| {
            game.timer = Some(TimerSettings {
                total_minutes: 1,
                stage_minutes: None,
            });
            game.started_at = Some(SystemTime::now() - Duration::from_secs(120));
            Ok::<_, ()>(())
        })
        .await
        .unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/join",
        None,
        Some(json!({ "joinToken": "incas-2025", "playerName": "Late Luis" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "game is not active");
}

#[tokio::test]
async fn join_token_with_surrounding_spaces_is_accepted() {
    let (app, _state) = create_test_app().await;
    let joined = join(&app, " incas-2025 ", "Ana").await;
    assert_eq!(joined["teamName"], "Incas");
}

#[tokio::test]
async fn healthcheck_reports_ok_with_memory_store() {
    let (app, _state) = create_test_app().await;
    let (status, body) = call(&app, "GET", "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn openapi_document_is_served_next_to_swagger_ui() {
    let (app, _state) = create_test_app().await;
    let (status, doc) = call(&app, "GET", "/docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/game/answer"].is_object());
}
