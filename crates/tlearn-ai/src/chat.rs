//! Chat over persisted summaries, plus suggested questions.

use tracing::warn;

use tlearn_db::{ChatRepository, Db, SummaryRepository};
use tlearn_models::{AiSettings, ChatRole, Video};

use crate::prompts::suggested_questions_prompt;
use crate::provider::Gateway;
use crate::tools::search_tools;

/// System instruction for every chat turn.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant that answers questions about a YouTube video. \
     You have access to the video's summary and transcript. \
     Use this context to provide accurate, helpful answers. \
     You contain knowledge up to your training cutoff, but you have access to Google Search to find current information. \
     Use search to verify facts, find definitions, or get updates on topics discussed in the video. \
     If the user asks about something not covered in the video, use search to help them. \
     Be conversational and friendly. Format your responses in markdown when helpful. \
     If you reference specific parts, mention approximate timestamps when available.";

/// Most recent messages included as conversation context.
const CHAT_HISTORY_WINDOW: u32 = 20;

/// Transcript prefix included as context.
const TRANSCRIPT_CONTEXT_CHARS: usize = 10_000;

/// Summary prefix fed to the question-suggestion call.
const SUGGESTION_SAMPLE_CHARS: usize = 3_000;

/// Generate an assistant reply for a video, using the latest completed
/// summary and cached transcript as context.
///
/// The caller persists the user's message before invoking this, so a failed
/// turn still leaves the question in history. No retry here; gateway errors
/// surface directly.
pub async fn generate_chat_response(
    gateway: &Gateway,
    db: &Db,
    video: &Video,
    settings: &AiSettings,
    user_message: &str,
) -> anyhow::Result<String> {
    let summaries = SummaryRepository::new(db.clone());
    let chat = ChatRepository::new(db.clone());

    let latest = summaries.latest_completed(&video.id).await?;
    let history = chat.recent(&video.id, CHAT_HISTORY_WINDOW).await?;

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(
        "VIDEO: {:?} by {}",
        video.title,
        video.channel_name.as_deref().unwrap_or("Unknown")
    ));

    if let Some(summary) = &latest {
        if let Some(markdown) = &summary.markdown {
            lines.push(String::new());
            lines.push("VIDEO SUMMARY:".to_string());
            lines.push(markdown.clone());
        }
        if let Some(transcript) = &summary.transcript {
            lines.push(String::new());
            lines.push("TRANSCRIPT (partial):".to_string());
            lines.push(truncate_chars(transcript, TRANSCRIPT_CONTEXT_CHARS).to_string());
        }
    }

    if !history.is_empty() {
        lines.push(String::new());
        lines.push("CONVERSATION HISTORY:".to_string());
        for message in &history {
            let role = match message.role {
                ChatRole::User => "Human",
                ChatRole::Assistant => "Assistant",
            };
            lines.push(format!("{}: {}", role, message.content));
            lines.push(String::new());
        }
    }

    lines.push(String::new());
    lines.push(format!("Human: {}", user_message));
    lines.push(String::new());
    lines.push("Provide a helpful response:".to_string());

    let tools = search_tools(settings.provider);
    let result = gateway
        .generate(
            settings,
            &lines.join("\n"),
            Some(CHAT_SYSTEM_INSTRUCTION),
            tools.as_ref(),
        )
        .await?;

    Ok(result.text)
}

/// Suggested questions for a video, derived from its latest completed
/// summary. Falls back to a fixed list whenever anything goes wrong.
pub async fn suggested_questions(
    gateway: &Gateway,
    db: &Db,
    video: &Video,
    settings: &AiSettings,
) -> Vec<String> {
    let summaries = SummaryRepository::new(db.clone());

    let markdown = match summaries.latest_completed(&video.id).await {
        Ok(Some(summary)) => summary.markdown,
        _ => None,
    };

    let Some(markdown) = markdown.filter(|m| !m.is_empty()) else {
        return vec![
            "What is this video about?".to_string(),
            "What are the key takeaways?".to_string(),
            "Can you explain the main concepts?".to_string(),
        ];
    };

    let prompt = suggested_questions_prompt(truncate_chars(&markdown, SUGGESTION_SAMPLE_CHARS));

    if let Ok(result) = gateway.generate(settings, &prompt, None, None).await {
        if let Ok(questions) = serde_json::from_str::<Vec<String>>(&result.text) {
            return questions.into_iter().take(4).collect();
        }
        warn!(video_id = %video.id, "Suggested questions were not a JSON array");
    }

    vec![
        "What is this video about?".to_string(),
        "What are the key takeaways?".to_string(),
        "Can you explain the main concepts?".to_string(),
        "What are the practical applications?".to_string(),
    ]
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}
