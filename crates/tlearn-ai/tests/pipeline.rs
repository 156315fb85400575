//! End-to-end pipeline tests against a fake OpenAI-compatible backend.
//!
//! The transcript cache is pre-seeded on the video row so no caption
//! fetching leaves the process; every model call goes to wiremock.

use std::sync::Arc;

use regex::Regex;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tlearn_ai::{Gateway, SummarizationPipeline, TranscriptSource};
use tlearn_db::{Db, SummaryRepository, UserRepository, VideoRepository};
use tlearn_models::{
    AiProvider, AiSettings, Category, SummaryStatus, TranscriptDoc, TranscriptSegment, Video,
};

struct Fixture {
    db: Db,
    pipeline: SummarizationPipeline,
    settings: AiSettings,
    video: Video,
}

async fn fixture(server: &MockServer) -> Fixture {
    let db = Db::open_in_memory().await.unwrap();
    UserRepository::new(db.clone())
        .upsert("user-1", Some("user@example.com"))
        .await
        .unwrap();

    let videos = VideoRepository::new(db.clone(), "user-1");
    let video = Video::new("user-1", "yt-abc", "Intro to Borrowing").with_channel("RustCasts");
    videos.create(&video).await.unwrap();

    let transcript = TranscriptDoc {
        video_id: "yt-abc".into(),
        language: "en".into(),
        segments: (0..40)
            .map(|i| TranscriptSegment {
                text: format!("sentence number {} about ownership and borrowing", i),
                start: i as f64 * 5.0,
                duration: 5.0,
            })
            .collect(),
    };
    videos
        .store_cached_transcript("yt-abc", &transcript)
        .await
        .unwrap();

    let settings = AiSettings {
        provider: AiProvider::OpenaiCompatible,
        model: "test-model".into(),
        api_key: Some("sk-test".into()),
        base_url: Some(server.uri()),
    };

    let pipeline = SummarizationPipeline::new(
        Arc::new(Gateway::new()),
        Arc::new(TranscriptSource::new()),
        db.clone(),
        None,
    );

    Fixture {
        db,
        pipeline,
        settings,
        video,
    }
}

fn completion(content: &str, input: u32, output: u32) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": {
            "prompt_tokens": input,
            "completion_tokens": output,
            "total_tokens": input + output
        }
    }))
}

/// Pass-1 responses match on the structural-analysis prompt wording, pass 2
/// on the deep-summary wording, and so on.
async fn mount_pass1(server: &MockServer, content: &str, input: u32, output: u32) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert content analyst"))
        .respond_with(completion(content, input, output))
        .mount(server)
        .await;
}

async fn mount_pass2(server: &MockServer, content: &str, input: u32, output: u32) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert educational content writer"))
        .respond_with(completion(content, input, output))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_completes_with_two_passes_and_footer() {
    let server = MockServer::start().await;
    mount_pass1(&server, r#"{"category":"ai_ml","key_topics":["borrowing"]}"#, 100, 50).await;
    mount_pass2(&server, "# 🎬 Intro to Borrowing\n\nDeep summary body.", 200, 150).await;

    let f = fixture(&server).await;
    let summaries = SummaryRepository::new(f.db.clone());
    let summary = summaries
        .create_processing(&f.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();

    let outcome = f
        .pipeline
        .run("user-1", &f.video, &summary.id, &f.settings, "en")
        .await
        .unwrap();

    assert_eq!(outcome.passes_completed, 2);
    assert_eq!(outcome.category, Category::AiMl);

    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.status, SummaryStatus::Completed);
    assert_eq!(row.passes_completed, 2);
    assert_eq!(row.category, Some(Category::AiMl));
    assert!(row.transcript.as_deref().unwrap().contains("[0:00]"));

    let markdown = row.markdown.unwrap();
    assert!(markdown.starts_with("# 🎬 Intro to Borrowing"));
    let footer = Regex::new(
        r"\*AI Usage: \[Input: \d+ \| Output: \d+ \| Total: \d+ tokens \| Duration: \d+s\]\*$",
    )
    .unwrap();
    assert!(footer.is_match(&markdown), "missing footer in {:?}", markdown);

    // usage = pass1 + pass2, accumulated monotonically
    assert_eq!(row.usage.input_tokens, 300);
    assert_eq!(row.usage.output_tokens, 200);
    assert_eq!(row.usage.total_tokens, 500);
}

#[tokio::test]
async fn prose_analysis_falls_back_to_category_detection() {
    let server = MockServer::start().await;
    mount_pass1(&server, "This video is about the French Revolution.", 10, 10).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Classify this video transcript"))
        .respond_with(completion("  History \n", 5, 1))
        .expect(1)
        .mount(&server)
        .await;
    mount_pass2(&server, "# Revolution\n\nBody.", 20, 20).await;

    let f = fixture(&server).await;
    let summaries = SummaryRepository::new(f.db.clone());
    let summary = summaries
        .create_processing(&f.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();

    f.pipeline
        .run("user-1", &f.video, &summary.id, &f.settings, "en")
        .await
        .unwrap();

    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.category, Some(Category::History));
    // detection-call usage is accumulated too: 10+5+20 / 10+1+20
    assert_eq!(row.usage.input_tokens, 35);
    assert_eq!(row.usage.output_tokens, 31);
}

#[tokio::test]
async fn pass2_failure_is_terminal_and_labeled() {
    let server = MockServer::start().await;
    mount_pass1(&server, r#"{"category":"gaming"}"#, 10, 10).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert educational content writer"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let f = fixture(&server).await;
    let summaries = SummaryRepository::new(f.db.clone());
    let summary = summaries
        .create_processing(&f.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();

    let result = f
        .pipeline
        .run("user-1", &f.video, &summary.id, &f.settings, "en")
        .await;
    assert!(result.is_err());

    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.status, SummaryStatus::Failed);
    assert!(row.error_message.unwrap().starts_with("Pass 2 failed:"));
    // pass 1 results survive, pass 2 never landed
    assert_eq!(row.passes_completed, 1);
    assert!(row.markdown.is_none());
    assert_eq!(row.category, Some(Category::Gaming));
}

#[tokio::test]
async fn pass1_failure_is_terminal_and_labeled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let f = fixture(&server).await;
    let summaries = SummaryRepository::new(f.db.clone());
    let summary = summaries
        .create_processing(&f.video.id, "openai-compatible", "test-model", "en")
        .await
        .unwrap();

    let result = f
        .pipeline
        .run("user-1", &f.video, &summary.id, &f.settings, "en")
        .await;
    assert!(result.is_err());

    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.status, SummaryStatus::Failed);
    assert!(row.error_message.unwrap().starts_with("Pass 1 failed:"));
    assert_eq!(row.passes_completed, 0);
    assert!(row.markdown.is_none());
    // transcript snapshot was stored before the failing pass
    assert!(row.transcript.is_some());
}

#[tokio::test]
async fn translation_failure_degrades_to_original_with_note() {
    let server = MockServer::start().await;
    mount_pass1(&server, r#"{"category":"tech_talk"}"#, 10, 10).await;
    mount_pass2(&server, "# Talk\n\nEnglish body.", 20, 20).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert translator"))
        .respond_with(ResponseTemplate::new(500).set_body_string("no can do"))
        .mount(&server)
        .await;

    let f = fixture(&server).await;
    let summaries = SummaryRepository::new(f.db.clone());
    let summary = summaries
        .create_processing(&f.video.id, "openai-compatible", "test-model", "tr")
        .await
        .unwrap();

    // translation failure must NOT fail the pipeline
    let outcome = f
        .pipeline
        .run("user-1", &f.video, &summary.id, &f.settings, "tr")
        .await
        .unwrap();
    assert_eq!(outcome.passes_completed, 3);

    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.status, SummaryStatus::Completed);
    let markdown = row.markdown.unwrap();
    assert!(markdown.contains("English body."));
    assert!(markdown.contains("> **Note:** Translation to tr failed. Showing original English summary."));
    // the footer still lands after the note
    assert!(markdown.contains("*AI Usage:"));
}

#[tokio::test]
async fn translation_success_replaces_markdown() {
    let server = MockServer::start().await;
    mount_pass1(&server, r#"{"category":"education"}"#, 10, 10).await;
    mount_pass2(&server, "# Lesson\n\nEnglish body.", 20, 20).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("expert translator"))
        .respond_with(completion("# Ders\n\nTürkçe metin.", 30, 30))
        .mount(&server)
        .await;

    let f = fixture(&server).await;
    let summaries = SummaryRepository::new(f.db.clone());
    let summary = summaries
        .create_processing(&f.video.id, "openai-compatible", "test-model", "tr")
        .await
        .unwrap();

    f.pipeline
        .run("user-1", &f.video, &summary.id, &f.settings, "tr")
        .await
        .unwrap();

    let row = summaries.get(&summary.id).await.unwrap().unwrap();
    assert_eq!(row.status, SummaryStatus::Completed);
    assert_eq!(row.passes_completed, 3);
    let markdown = row.markdown.unwrap();
    // translated text replaces, not merges
    assert!(markdown.starts_with("# Ders"));
    assert!(!markdown.contains("English body."));
    assert_eq!(row.usage.total_tokens, 120);
}
