//! Summary handlers: list, trigger, delete, translate.
//!
//! The trigger handler owns the admission/staleness guard that upholds the
//! at-most-one-processing-attempt-per-video invariant. The check is
//! check-then-act over the database, not a lock; two concurrent triggers for
//! the same video can race past it. The window is one request round-trip and
//! the cost is a redundant attempt, so it stays a documented weakness.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use tlearn_ai::prompts::translation_prompt;
use tlearn_db::{SettingsRepository, SummaryRepository, VideoRepository};
use tlearn_models::{
    Summary, SummaryId, Video, DEFAULT_LANGUAGE, STALE_THRESHOLD_SECS,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Serialized summary row for polling clients.
#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_model: Option<String>,
    pub passes_completed: u32,
    pub target_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub translations: BTreeMap<String, String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Summary> for SummaryView {
    fn from(s: Summary) -> Self {
        Self {
            id: s.id.to_string(),
            status: s.status.as_str().to_string(),
            markdown: s.markdown,
            category: s.category.map(|c| c.as_str().to_string()),
            provider: s.provider,
            provider_model: s.provider_model,
            passes_completed: s.passes_completed,
            target_language: s.target_language,
            error_message: s.error_message,
            translations: s.translations,
            input_tokens: s.usage.input_tokens,
            output_tokens: s.usage.output_tokens,
            total_tokens: s.usage.total_tokens,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummariesResponse {
    pub summaries: Vec<SummaryView>,
}

/// GET /api/videos/:youtube_id/summaries
///
/// All attempts for the video, newest first. Clients poll this while an
/// attempt is processing and render progress from `passes_completed`.
pub async fn list_summaries(
    State(state): State<AppState>,
    Path(youtube_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<SummariesResponse>> {
    let video = resolve_video(&state, &user, &youtube_id).await?;
    let summaries = SummaryRepository::new(state.db.clone())
        .list_for_video(&video.id)
        .await?;

    Ok(Json(SummariesResponse {
        summaries: summaries.into_iter().map(SummaryView::from).collect(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSummaryRequest {
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSummaryResponse {
    pub status: String,
    pub summary_id: String,
    pub provider: String,
    pub provider_model: String,
    pub message: String,
}

/// POST /api/videos/:youtube_id/summaries
///
/// Trigger a new summarization attempt. Never overwrites earlier attempts.
///
/// Admission guard: at most one attempt per video may be `processing`. A
/// fresh in-flight attempt rejects the request with 409; one whose heartbeat
/// is older than the staleness threshold is reaped (marked failed with a
/// timeout message) and a new attempt is admitted in its place.
pub async fn start_summary(
    State(state): State<AppState>,
    Path(youtube_id): Path<String>,
    user: AuthUser,
    body: Option<Json<StartSummaryRequest>>,
) -> ApiResult<Json<StartSummaryResponse>> {
    let target_language = body
        .and_then(|Json(b)| b.target_language)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let video = resolve_video(&state, &user, &youtube_id).await?;
    let summaries = SummaryRepository::new(state.db.clone());

    if let Some(processing) = summaries.find_processing(&video.id).await? {
        if processing.is_stale(STALE_THRESHOLD_SECS) {
            let minutes = (processing.stale_elapsed_secs() as f64 / 60.0).round() as i64;
            warn!(
                summary_id = %processing.id,
                video_id = %video.id,
                elapsed_minutes = minutes,
                "Reaping stale summary attempt"
            );
            summaries
                .mark_failed(&processing.id, &format!("Timed out after {} minutes", minutes))
                .await?;
            // fall through and admit a new attempt
        } else {
            return Err(ApiError::conflict("Already processing"));
        }
    }

    let settings = SettingsRepository::new(state.db.clone()).get(&user.uid).await?;

    let summary = summaries
        .create_processing(
            &video.id,
            settings.provider.as_str(),
            &settings.model,
            &target_language,
        )
        .await?;

    spawn_pipeline(&state, &user.uid, video, summary.id.clone(), target_language);

    Ok(Json(StartSummaryResponse {
        status: "processing".to_string(),
        summary_id: summary.id.to_string(),
        provider: settings.provider.as_str().to_string(),
        provider_model: settings.model,
        message: "Summarization started".to_string(),
    }))
}

/// Run the pipeline as a detached task.
///
/// The request returns immediately; completion is observed by polling the
/// summary row. The catch-all here is the must-not-leak-processing-forever
/// backstop: whatever fails inside the pipeline (including its own failure
/// bookkeeping), the row ends up terminal.
fn spawn_pipeline(
    state: &AppState,
    user_id: &str,
    video: Video,
    summary_id: SummaryId,
    target_language: String,
) {
    let pipeline = state.pipeline();
    let db = state.db.clone();
    let user_id = user_id.to_string();

    tokio::spawn(async move {
        let settings = match SettingsRepository::new(db.clone()).get(&user_id).await {
            Ok(settings) => settings,
            Err(e) => {
                error!(summary_id = %summary_id, error = %e, "Failed to resolve AI settings");
                SummaryRepository::new(db.clone())
                    .mark_failed(&summary_id, &e.to_string())
                    .await
                    .ok();
                return;
            }
        };

        if let Err(e) = pipeline
            .run(&user_id, &video, &summary_id, &settings, &target_language)
            .await
        {
            error!(summary_id = %summary_id, error = %e, "Summarization pipeline failed");

            // Per-pass handlers should have marked the row already; make
            // sure nothing is left processing.
            let summaries = SummaryRepository::new(db);
            match summaries.get(&summary_id).await {
                Ok(Some(row)) if !row.is_terminal() => {
                    if let Err(update_err) =
                        summaries.mark_failed(&summary_id, &e.to_string()).await
                    {
                        error!(
                            summary_id = %summary_id,
                            error = %update_err,
                            "Failed to mark summary failed"
                        );
                    }
                }
                Ok(_) => {}
                Err(read_err) => {
                    error!(
                        summary_id = %summary_id,
                        error = %read_err,
                        "Failed to read summary after pipeline error"
                    );
                }
            }
        }
    });
}

#[derive(Debug, Serialize)]
pub struct DeleteSummaryResponse {
    pub message: String,
}

/// DELETE /api/videos/:youtube_id/summaries/:summary_id
pub async fn delete_summary(
    State(state): State<AppState>,
    Path((youtube_id, summary_id)): Path<(String, String)>,
    user: AuthUser,
) -> ApiResult<Json<DeleteSummaryResponse>> {
    let video = resolve_video(&state, &user, &youtube_id).await?;
    let summaries = SummaryRepository::new(state.db.clone());

    let summary_id = SummaryId::from_string(summary_id);
    let summary = summaries
        .get(&summary_id)
        .await?
        .filter(|s| s.video_id == video.id)
        .ok_or_else(|| ApiError::not_found("Summary not found"))?;

    summaries.delete(&summary.id).await?;
    info!(summary_id = %summary.id, video_id = %video.id, "Deleted summary");

    Ok(Json(DeleteSummaryResponse {
        message: "Summary deleted".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub target_language: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub markdown: String,
    pub cached: bool,
}

/// POST /api/summaries/:summary_id/translate
///
/// Translate a stored summary on demand, independent of the pipeline. The
/// per-summary translations map is a cache: a hit returns without any
/// gateway call, a miss merges the new language in without discarding
/// previously cached ones.
pub async fn translate_summary(
    State(state): State<AppState>,
    Path(summary_id): Path<String>,
    user: AuthUser,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Json<TranslateResponse>> {
    if request.target_language.is_empty() {
        return Err(ApiError::bad_request("target_language required"));
    }

    let summaries = SummaryRepository::new(state.db.clone());
    let summary_id = SummaryId::from_string(summary_id);
    let summary = summaries
        .get(&summary_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Summary not found"))?;

    // Ownership check via the owning video.
    let videos = VideoRepository::new(state.db.clone(), &user.uid);
    if videos.get(&summary.video_id).await?.is_none() {
        return Err(ApiError::forbidden("Access denied"));
    }

    if let Some(cached) = summary.translations.get(&request.target_language) {
        return Ok(Json(TranslateResponse {
            markdown: cached.clone(),
            cached: true,
        }));
    }

    let markdown = summary
        .markdown
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("Original summary content is empty"))?;

    let settings = SettingsRepository::new(state.db.clone()).get(&user.uid).await?;
    let result = state
        .gateway
        .generate(
            &settings,
            &translation_prompt(markdown, &request.target_language),
            None,
            None,
        )
        .await?;

    summaries
        .merge_translation(&summary.id, &request.target_language, &result.text, &result.usage)
        .await?;

    info!(
        summary_id = %summary.id,
        target_language = %request.target_language,
        "Cached new translation"
    );

    Ok(Json(TranslateResponse {
        markdown: result.text,
        cached: false,
    }))
}

/// Resolve a video by platform ID within the caller's library.
async fn resolve_video(
    state: &AppState,
    user: &AuthUser,
    youtube_id: &str,
) -> ApiResult<Video> {
    VideoRepository::new(state.db.clone(), &user.uid)
        .find_by_youtube_id(youtube_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}
