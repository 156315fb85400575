//! Multi-pass summarization pipeline.
//!
//! One run drives a single Summary attempt through its state machine:
//! transcript acquisition, pass 1 (structural analysis + category), pass 2
//! (deep summary), optional pass 3 (translation), finalization.
//! Pass 1/2 failures are fatal and mark the row failed with a pass-labeled
//! message; pass 3 failure degrades to the untranslated markdown with a
//! visible note. Intermediate state is persisted after every step so the
//! attempt is observable (and its row's `updated_at` keeps heartbeating).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{error, info, warn};

use tlearn_db::{Db, SummaryRepository, VideoRepository};
use tlearn_models::{
    AiSettings, Category, SummaryId, TokenUsage, Video, DEFAULT_LANGUAGE,
};

use crate::error::AiResult;
use crate::export;
use crate::prompts::{
    category_detection_prompt, deep_summary_prompt, structural_analysis_prompt, translation_prompt,
};
use crate::provider::Gateway;
use crate::transcript::TranscriptSource;

/// Transcript cap fed into the prompts.
pub const MAX_TRANSCRIPT_CHARS: usize = 100_000;

const TRUNCATION_MARKER: &str = "\n\n[Transcript truncated...]";

/// Sample size for the fallback category-classification call.
const CATEGORY_SAMPLE_CHARS: usize = 3_000;

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub markdown: String,
    pub category: Category,
    pub passes_completed: u32,
    pub usage: TokenUsage,
}

/// The summarization pipeline and its collaborators.
pub struct SummarizationPipeline {
    gateway: Arc<Gateway>,
    transcripts: Arc<TranscriptSource>,
    db: Db,
    /// Export directory for the fire-and-forget markdown artifact; `None`
    /// disables export.
    export_dir: Option<PathBuf>,
}

impl SummarizationPipeline {
    pub fn new(
        gateway: Arc<Gateway>,
        transcripts: Arc<TranscriptSource>,
        db: Db,
        export_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            gateway,
            transcripts,
            db,
            export_dir,
        }
    }

    /// Run one summarization attempt to a terminal state.
    ///
    /// Per-step error handlers persist `failed` before propagating, so a
    /// returned error means the row is already terminal. The spawning caller
    /// still wraps this in a catch-all as the backstop for anything that
    /// slips through (including persistence failures inside the handlers).
    pub async fn run(
        &self,
        user_id: &str,
        video: &Video,
        summary_id: &SummaryId,
        settings: &AiSettings,
        target_language: &str,
    ) -> anyhow::Result<PipelineOutcome> {
        let started = Instant::now();
        let videos = VideoRepository::new(self.db.clone(), user_id);
        let summaries = SummaryRepository::new(self.db.clone());

        info!(
            summary_id = %summary_id,
            video_id = %video.id,
            provider = %settings.provider,
            model = %settings.model,
            target_language = %target_language,
            "Starting summarization pipeline"
        );

        // Step 1: transcript acquisition. Fatal on failure.
        let transcript = match self
            .transcripts
            .fetch_with_cache(&videos, &video.youtube_id, DEFAULT_LANGUAGE)
            .await
        {
            Ok(doc) => doc.to_timed_text(),
            Err(e) => {
                summaries
                    .mark_failed(summary_id, &format!("Failed to fetch transcript: {}", e))
                    .await
                    .ok();
                return Err(e).context("transcript acquisition");
            }
        };

        let transcript = truncate_transcript(&transcript);
        summaries.store_transcript(summary_id, &transcript).await?;

        let mut total_usage = TokenUsage::default();

        // Pass 1: structural analysis + category classification. Fatal,
        // including the persistence of its results.
        let pass1 = async {
            let (analysis, category) = self.run_pass1(settings, &transcript, &mut total_usage).await?;
            summaries
                .record_pass1(
                    summary_id,
                    &analysis,
                    category,
                    settings.provider.as_str(),
                    &settings.model,
                )
                .await?;
            anyhow::Ok((analysis, category))
        }
        .await;

        let (structural_analysis, category) = match pass1 {
            Ok(result) => result,
            Err(e) => {
                summaries
                    .mark_failed(summary_id, &format!("Pass 1 failed: {}", e))
                    .await
                    .ok();
                return Err(e.context("pass 1"));
            }
        };

        // Pass 2: deep summary. The last fatal step.
        let pass2 = async {
            let result = self
                .gateway
                .generate(
                    settings,
                    &deep_summary_prompt(&transcript, &structural_analysis, category),
                    None,
                    None,
                )
                .await?;
            total_usage.add(&result.usage);
            summaries.record_pass2(summary_id, &result.text).await?;
            anyhow::Ok(result.text)
        }
        .await;

        let deep_summary = match pass2 {
            Ok(markdown) => markdown,
            Err(e) => {
                summaries
                    .mark_failed(summary_id, &format!("Pass 2 failed: {}", e))
                    .await
                    .ok();
                return Err(e.context("pass 2"));
            }
        };

        // Pass 3: optional translation. Best-effort enrichment from here on.
        let mut final_markdown = deep_summary;
        if target_language != DEFAULT_LANGUAGE {
            match self
                .gateway
                .generate(
                    settings,
                    &translation_prompt(&final_markdown, target_language),
                    None,
                    None,
                )
                .await
            {
                Ok(result) => {
                    total_usage.add(&result.usage);
                    final_markdown = result.text;
                }
                Err(e) => {
                    warn!(summary_id = %summary_id, error = %e, "Translation pass failed");
                    final_markdown.push_str(&format!(
                        "\n\n> **Note:** Translation to {} failed. Showing original English summary.",
                        target_language
                    ));
                }
            }
        }

        let passes_completed = if target_language != DEFAULT_LANGUAGE { 3 } else { 2 };

        // Finalization: the usage/duration footer is appended exactly once,
        // after every pass that ran.
        let duration_secs = started.elapsed().as_secs_f64().round() as u64;
        final_markdown.push_str(&format!(
            "\n\n---\n*AI Usage: [Input: {} | Output: {} | Total: {} tokens | Duration: {}s]*",
            total_usage.input_tokens,
            total_usage.output_tokens,
            total_usage.total_tokens,
            duration_secs
        ));

        summaries
            .finalize(summary_id, &final_markdown, passes_completed, &total_usage)
            .await?;

        info!(
            summary_id = %summary_id,
            passes_completed = passes_completed,
            total_tokens = total_usage.total_tokens,
            duration_secs = duration_secs,
            "Summarization pipeline completed"
        );

        // Fire-and-forget export; never affects the terminal state.
        if let Some(dir) = &self.export_dir {
            let db = self.db.clone();
            let dir = dir.clone();
            let user_id = user_id.to_string();
            let summary_id = summary_id.clone();
            tokio::spawn(async move {
                if let Err(e) = export::export_summary(&db, &dir, &user_id, &summary_id).await {
                    error!(summary_id = %summary_id, error = %e, "Summary export failed");
                }
            });
        }

        Ok(PipelineOutcome {
            markdown: final_markdown,
            category,
            passes_completed,
            usage: total_usage,
        })
    }

    /// Pass 1: structural analysis, with a dedicated classification call as
    /// the category fallback when the analysis is not valid JSON.
    async fn run_pass1(
        &self,
        settings: &AiSettings,
        transcript: &str,
        total_usage: &mut TokenUsage,
    ) -> AiResult<(String, Category)> {
        let result = self
            .gateway
            .generate(settings, &structural_analysis_prompt(transcript), None, None)
            .await?;
        total_usage.add(&result.usage);
        let structural_analysis = result.text;

        let category = match serde_json::from_str::<serde_json::Value>(&structural_analysis) {
            Ok(parsed) => Category::parse(
                parsed
                    .get("category")
                    .and_then(|c| c.as_str())
                    .unwrap_or("general"),
            ),
            Err(_) => {
                // Analysis came back as prose; classify from a sample with a
                // smaller dedicated call.
                let sample = truncate_chars(transcript, CATEGORY_SAMPLE_CHARS);
                let detection = self
                    .gateway
                    .generate(settings, &category_detection_prompt(sample), None, None)
                    .await?;
                total_usage.add(&detection.usage);
                Category::parse(&detection.text)
            }
        };

        Ok((structural_analysis, category))
    }
}

/// Cap a transcript at the prompt budget, appending a visible marker when
/// content was dropped.
fn truncate_transcript(transcript: &str) -> String {
    if transcript.chars().count() <= MAX_TRANSCRIPT_CHARS {
        return transcript.to_string();
    }
    let mut truncated = truncate_chars(transcript, MAX_TRANSCRIPT_CHARS).to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// First `max_chars` characters, respecting UTF-8 boundaries.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_utf8() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_truncate_transcript_appends_marker() {
        let long = "x".repeat(MAX_TRANSCRIPT_CHARS + 100);
        let truncated = truncate_transcript(&long);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            truncated.chars().count(),
            MAX_TRANSCRIPT_CHARS + TRUNCATION_MARKER.chars().count()
        );

        let short = "short transcript";
        assert_eq!(truncate_transcript(short), short);
    }
}
