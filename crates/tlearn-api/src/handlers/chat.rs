//! Chat handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use tlearn_ai::chat::{generate_chat_response, suggested_questions};
use tlearn_db::{ChatRepository, SettingsRepository, VideoRepository};
use tlearn_models::{ChatMessage, ChatRole, Video};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
    pub suggestions: Vec<String>,
}

/// GET /api/videos/:youtube_id/chat
///
/// Conversation history plus suggested questions. Suggestions are derived
/// only while the conversation is still empty.
pub async fn get_chat(
    State(state): State<AppState>,
    Path(youtube_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<ChatHistoryResponse>> {
    let video = resolve_video(&state, &user, &youtube_id).await?;
    let messages = ChatRepository::new(state.db.clone()).history(&video.id).await?;

    let suggestions = if messages.is_empty() {
        let settings = SettingsRepository::new(state.db.clone()).get(&user.uid).await?;
        suggested_questions(&state.gateway, &state.db, &video, &settings).await
    } else {
        Vec::new()
    };

    Ok(Json(ChatHistoryResponse {
        messages,
        suggestions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PostChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PostChatResponse {
    pub message: ChatMessage,
}

/// POST /api/videos/:youtube_id/chat
///
/// Append the user's message, generate an assistant reply, persist it. The
/// user's message stays persisted even when generation fails, so a failed
/// turn still shows up in history. No retry; the gateway error surfaces
/// directly.
pub async fn post_chat(
    State(state): State<AppState>,
    Path(youtube_id): Path<String>,
    user: AuthUser,
    Json(request): Json<PostChatRequest>,
) -> ApiResult<Json<PostChatResponse>> {
    if request.message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    let video = resolve_video(&state, &user, &youtube_id).await?;
    let chat = ChatRepository::new(state.db.clone());

    chat.append(&video.id, ChatRole::User, &request.message).await?;

    let settings = SettingsRepository::new(state.db.clone()).get(&user.uid).await?;
    let reply = generate_chat_response(
        &state.gateway,
        &state.db,
        &video,
        &settings,
        &request.message,
    )
    .await
    .map_err(|e| {
        error!(video_id = %video.id, error = %e, "Chat generation failed");
        ApiError::internal(format!("Failed to generate response. {}", e))
    })?;

    let assistant_message = chat.append(&video.id, ChatRole::Assistant, &reply).await?;

    Ok(Json(PostChatResponse {
        message: assistant_message,
    }))
}

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
