//! Best-effort markdown export.
//!
//! Renders a completed summary to an Obsidian-style markdown file with
//! frontmatter. Triggered fire-and-forget after finalization; the caller
//! logs failures and nothing here affects the Summary's terminal state.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono::Utc;
use regex::Regex;
use tracing::info;

use tlearn_db::{Db, SummaryRepository, TagRepository, UserRepository, VideoRepository};
use tlearn_models::{SummaryId, DEFAULT_LANGUAGE};

/// Export a summary to
/// `{data_dir}/{user}/{playlist}/{channel} - {title}/{channel} - {title} - {model}[.lang].md`.
pub async fn export_summary(
    db: &Db,
    data_dir: &Path,
    user_id: &str,
    summary_id: &SummaryId,
) -> anyhow::Result<PathBuf> {
    let summaries = SummaryRepository::new(db.clone());
    let summary = summaries
        .get(summary_id)
        .await?
        .ok_or_else(|| anyhow!("summary {} not found", summary_id))?;

    let markdown = summary
        .markdown
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| anyhow!("summary {} has no markdown to export", summary_id))?;

    let videos = VideoRepository::new(db.clone(), user_id);
    let video = videos
        .get(&summary.video_id)
        .await?
        .ok_or_else(|| anyhow!("video {} not found for export", summary.video_id))?;

    let tags = TagRepository::new(db.clone(), user_id)
        .names_for_video(&video.id)
        .await
        .unwrap_or_default();

    let email = UserRepository::new(db.clone()).get_email(user_id).await?;

    // The playlist title lives with the platform sync collaborator; the
    // stored playlist id stands in for it here.
    let playlist_name = video.playlist_id.clone().unwrap_or_else(|| "Uncategorized".to_string());

    let user_folder = match email {
        Some(email) => sanitize_filename(&email),
        None => user_id.to_string(),
    };
    let channel = video
        .channel_name
        .as_deref()
        .map(sanitize_filename)
        .unwrap_or_else(|| "Unknown Channel".to_string());
    let title = sanitize_filename(&video.title);

    let video_folder = format!("{} - {}", channel, title);
    let model = summary.provider_model.as_deref().unwrap_or("ai");
    let mut file_name = format!("{} - {} - {}", channel, title, model);
    if summary.target_language != DEFAULT_LANGUAGE {
        file_name.push('.');
        file_name.push_str(&summary.target_language);
    }
    file_name.push_str(".md");

    let folder = data_dir
        .join(user_folder)
        .join(sanitize_filename(&playlist_name))
        .join(video_folder);
    let file_path = folder.join(file_name);

    let tag_list = tags
        .iter()
        .map(|t| format!("{:?}", t))
        .collect::<Vec<_>>()
        .join(", ");

    let frontmatter = format!(
        "---\n\
         tags: [{tags}]\n\
         video_url: {url}\n\
         channel: \"{channel}\"\n\
         playlist: \"{playlist}\"\n\
         model: \"{model}\"\n\
         created_at: {date}\n\
         video_published: \"{published}\"\n\
         duration: \"{duration}\"\n\
         rating: \n\
         status: \n\
         ---\n\n",
        tags = tag_list,
        url = video.watch_url(),
        channel = video.channel_name.as_deref().unwrap_or(""),
        playlist = playlist_name,
        model = model,
        date = Utc::now().format("%Y-%m-%d"),
        published = video
            .published_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        duration = video.duration.as_deref().unwrap_or(""),
    );

    tokio::fs::create_dir_all(&folder)
        .await
        .with_context(|| format!("creating export folder {}", folder.display()))?;
    tokio::fs::write(&file_path, format!("{}{}", frontmatter, markdown))
        .await
        .with_context(|| format!("writing export file {}", file_path.display()))?;

    info!(summary_id = %summary_id, path = %file_path.display(), "Exported summary");
    Ok(file_path)
}

/// Strip characters that are unsafe in file and folder names, collapsing
/// whitespace runs.
fn sanitize_filename(name: &str) -> String {
    let unsafe_chars = Regex::new(r"[^a-zA-Z0-9\u{00C0}-\u{024F}\u{1E00}-\u{1EFF} _-]").unwrap();
    let whitespace = Regex::new(r"\s+").unwrap();

    let cleaned = unsafe_chars.replace_all(name, "");
    whitespace.replace_all(cleaned.trim(), " ").to_string()
}
