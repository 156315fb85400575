//! API-level tests for the summary surface: admission guard, staleness
//! reaping, polling, deletion, and translate-on-demand caching.
//!
//! Model calls go to wiremock; the database is in-memory SQLite; transcripts
//! are pre-seeded on the video row so nothing leaves the process.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use regex::Regex;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tlearn_api::auth::issue_token;
use tlearn_api::{create_router, ApiConfig, AppState};
use tlearn_db::{Db, SettingsRepository, SummaryRepository, UserRepository, VideoRepository};
use tlearn_models::{
    AiProvider, AiSettings, SummaryId, SummaryStatus, TokenUsage, TranscriptDoc,
    TranscriptSegment, Video,
};

const TEST_SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    db: Db,
    video: Video,
    token: String,
}

async fn test_app(server: &MockServer) -> TestApp {
    let db = Db::open_in_memory().await.unwrap();

    UserRepository::new(db.clone())
        .upsert("user-1", Some("user@example.com"))
        .await
        .unwrap();

    let videos = VideoRepository::new(db.clone(), "user-1");
    let video = Video::new("user-1", "dQw4w9WgXcQ", "A Lecture").with_channel("LectureHall");
    videos.create(&video).await.unwrap();

    // ~2000-char transcript seeded into the cache
    let transcript = TranscriptDoc {
        video_id: "dQw4w9WgXcQ".into(),
        language: "en".into(),
        segments: (0..40)
            .map(|i| TranscriptSegment {
                text: format!("segment {} of the lecture, covering the topic in detail", i),
                start: i as f64 * 7.0,
                duration: 7.0,
            })
            .collect(),
    };
    videos
        .store_cached_transcript("dQw4w9WgXcQ", &transcript)
        .await
        .unwrap();

    SettingsRepository::new(db.clone())
        .upsert(
            "user-1",
            &AiSettings {
                provider: AiProvider::OpenaiCompatible,
                model: "test-model".into(),
                api_key: Some("sk-test".into()),
                base_url: Some(server.uri()),
            },
        )
        .await
        .unwrap();

    let config = ApiConfig {
        rate_limit_rps: 1000,
        export_dir: None,
        auth_secret: TEST_SECRET.to_string(),
        ..ApiConfig::default()
    };

    let state = AppState::with_db(config, db.clone());
    let router = create_router(state, None);
    let token = issue_token(TEST_SECRET, "user-1", Some("user@example.com"), 3600).unwrap();

    TestApp {
        router,
        db,
        video,
        token,
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150 }
    }))
}

async fn mount_happy_pipeline(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert content analyst"))
        .respond_with(completion(r#"{"category":"education"}"#))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert educational content writer"))
        .respond_with(completion("# 🎬 A Lecture\n\nThe deep summary."))
        .mount(server)
        .await;
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn wait_until_terminal(app: &TestApp) -> Value {
    for _ in 0..200 {
        let (status, body) = send(
            app,
            get("/api/videos/dQw4w9WgXcQ/summaries", &app.token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        if body["summaries"][0]["status"].as_str() != Some("processing") {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("summary never reached a terminal state");
}

#[tokio::test]
async fn start_then_poll_until_completed() {
    let server = MockServer::start().await;
    mount_happy_pipeline(&server).await;
    let app = test_app(&server).await;

    let (status, body) = send(
        &app,
        post_json("/api/videos/dQw4w9WgXcQ/summaries", &app.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");
    assert!(body["summary_id"].as_str().is_some());
    assert_eq!(body["provider"], "openai-compatible");

    let final_body = wait_until_terminal(&app).await;
    let summaries = final_body["summaries"].as_array().unwrap();
    assert_eq!(summaries.len(), 1);

    let row = &summaries[0];
    assert_eq!(row["status"], "completed");
    assert_eq!(row["passes_completed"], 2);
    assert_eq!(row["category"], "education");

    let markdown = row["markdown"].as_str().unwrap();
    let footer = Regex::new(
        r"\*AI Usage: \[Input: \d+ \| Output: \d+ \| Total: \d+ tokens \| Duration: \d+s\]\*$",
    )
    .unwrap();
    assert!(footer.is_match(markdown), "missing usage footer: {:?}", markdown);
}

#[tokio::test]
async fn second_start_within_staleness_window_is_rejected() {
    let server = MockServer::start().await;
    // slow pass 1 keeps the first attempt in flight
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            completion(r#"{"category":"education"}"#).set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;
    let app = test_app(&server).await;

    let (status, _) = send(
        &app,
        post_json("/api/videos/dQw4w9WgXcQ/summaries", &app.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        post_json("/api/videos/dQw4w9WgXcQ/summaries", &app.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].as_str().unwrap().contains("Already processing"));

    // no second row was created
    let (_, body) = send(&app, get("/api/videos/dQw4w9WgXcQ/summaries", &app.token)).await;
    assert_eq!(body["summaries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stale_processing_row_is_reaped_by_next_start() {
    let server = MockServer::start().await;
    mount_happy_pipeline(&server).await;
    let app = test_app(&server).await;

    // a stuck attempt whose heartbeat stopped 11 minutes ago
    let summaries = SummaryRepository::new(app.db.clone());
    let stuck = summaries
        .create_processing(&app.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();
    let backdated = (chrono::Utc::now() - chrono::Duration::minutes(11)).to_rfc3339();
    let stuck_id = stuck.id.as_str().to_string();
    app.db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE summaries SET updated_at = ?1 WHERE id = ?2",
                rusqlite::params![backdated, stuck_id],
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        post_json("/api/videos/dQw4w9WgXcQ/summaries", &app.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_id = body["summary_id"].as_str().unwrap().to_string();
    assert_ne!(new_id, stuck.id.to_string());

    // the stuck row is now failed with a timeout message
    let reaped = summaries.get(&stuck.id).await.unwrap().unwrap();
    assert_eq!(reaped.status, SummaryStatus::Failed);
    let message = reaped.error_message.unwrap();
    assert!(message.starts_with("Timed out after"), "got {:?}", message);

    // and the new attempt runs to completion
    let final_body = wait_until_terminal(&app).await;
    let rows = final_body["summaries"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], new_id.as_str());
    assert_eq!(rows[0]["status"], "completed");
}

#[tokio::test]
async fn delete_summary_and_not_found_cases() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let summaries = SummaryRepository::new(app.db.clone());
    let summary = summaries
        .create_processing(&app.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();
    summaries.mark_failed(&summary.id, "Pass 1 failed: x").await.unwrap();

    let (status, _) = send(
        &app,
        delete(
            &format!("/api/videos/dQw4w9WgXcQ/summaries/{}", summary.id),
            &app.token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // deleting again is a 404
    let (status, _) = send(
        &app,
        delete(
            &format!("/api/videos/dQw4w9WgXcQ/summaries/{}", summary.id),
            &app.token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // unknown video is a 404
    let (status, _) = send(
        &app,
        post_json("/api/videos/nope/summaries", &app.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/videos/dQw4w9WgXcQ/summaries")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn translate_is_cached_per_language() {
    let server = MockServer::start().await;
    // exactly one translation call may reach the backend
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert translator"))
        .respond_with(completion("# Ders\n\nÇeviri."))
        .expect(1)
        .mount(&server)
        .await;
    let app = test_app(&server).await;

    let summaries = SummaryRepository::new(app.db.clone());
    let summary = summaries
        .create_processing(&app.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();
    summaries
        .finalize(&summary.id, "# Lecture\n\nBody.", 2, &TokenUsage::new(1, 1, 2))
        .await
        .unwrap();

    let translate_path = format!("/api/summaries/{}/translate", summary.id);

    let (status, body) = send(
        &app,
        post_json(&translate_path, &app.token, json!({ "target_language": "tr" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
    let first_markdown = body["markdown"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post_json(&translate_path, &app.token, json!({ "target_language": "tr" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], true);
    assert_eq!(body["markdown"].as_str().unwrap(), first_markdown);

    // usage counters were bumped once by the miss
    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.usage.total_tokens, 2 + 150);
    assert_eq!(row.translations.get("tr").unwrap(), &first_markdown);
}

#[tokio::test]
async fn translate_rejects_empty_source_and_foreign_owner() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let summaries = SummaryRepository::new(app.db.clone());
    let empty = summaries
        .create_processing(&app.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();

    // nothing to translate yet
    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/summaries/{}/translate", empty.id),
            &app.token,
            json!({ "target_language": "tr" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // another user's summary is off limits
    UserRepository::new(app.db.clone()).upsert("user-2", None).await.unwrap();
    let other_videos = VideoRepository::new(app.db.clone(), "user-2");
    let other_video = Video::new("user-2", "other-yt", "Other");
    other_videos.create(&other_video).await.unwrap();
    let foreign = summaries
        .create_processing(&other_video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();
    summaries
        .finalize(&foreign.id, "# Foreign", 2, &TokenUsage::default())
        .await
        .unwrap();

    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/summaries/{}/translate", foreign.id),
            &app.token,
            json!({ "target_language": "tr" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // unknown summary id
    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/summaries/{}/translate", SummaryId::new()),
            &app.token,
            json!({ "target_language": "tr" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_chat_turn_keeps_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;
    let app = test_app(&server).await;

    let (status, _) = send(
        &app,
        post_json(
            "/api/videos/dQw4w9WgXcQ/chat",
            &app.token,
            json!({ "message": "What is this about?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // the question survives the failed turn
    let (status, body) = send(&app, get("/api/videos/dQw4w9WgXcQ/chat", &app.token)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "What is this about?");
    // suggestions are only offered on an empty conversation
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn chat_round_trip_persists_assistant_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("It covers the lecture topics."))
        .mount(&server)
        .await;
    let app = test_app(&server).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/videos/dQw4w9WgXcQ/chat",
            &app.token,
            json!({ "message": "What is covered?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["role"], "assistant");
    assert_eq!(body["message"]["content"], "It covers the lecture topics.");

    let (_, body) = send(&app, get("/api/videos/dQw4w9WgXcQ/chat", &app.token)).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}
