//! Typed repository for summary attempts.
//!
//! Writes follow the pipeline's fixed order (transcript, then pass 1, then
//! pass 2, then finalization) and every write bumps `updated_at`, which the
//! admission guard reads as the attempt's heartbeat.

use std::collections::BTreeMap;

use chrono::Utc;
use metrics::counter;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use tlearn_models::{Category, Summary, SummaryId, SummaryStatus, TokenUsage, VideoId};

use crate::client::{parse_datetime, Db};
use crate::error::DbResult;

const SUMMARY_COLUMNS: &str = "id, video_id, status, transcript, structural_analysis, category, \
     markdown, passes_completed, provider, provider_model, target_language, \
     input_tokens, output_tokens, total_tokens, translations, error_message, \
     created_at, updated_at";

/// Repository for summary rows.
pub struct SummaryRepository {
    db: Db,
}

impl SummaryRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a fresh attempt in `processing` state.
    ///
    /// Never overwrites earlier attempts; history is preserved.
    pub async fn create_processing(
        &self,
        video_id: &VideoId,
        provider: &str,
        provider_model: &str,
        target_language: &str,
    ) -> DbResult<Summary> {
        let now = Utc::now();
        let summary = Summary {
            id: SummaryId::new(),
            video_id: video_id.clone(),
            status: SummaryStatus::Processing,
            transcript: None,
            structural_analysis: None,
            category: None,
            markdown: None,
            passes_completed: 0,
            provider: Some(provider.to_string()),
            provider_model: Some(provider_model.to_string()),
            target_language: target_language.to_string(),
            usage: TokenUsage::default(),
            translations: BTreeMap::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        let s = summary.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO summaries
                       (id, video_id, status, passes_completed, provider, provider_model,
                        target_language, created_at, updated_at)
                       VALUES (?1, ?2, 'processing', 0, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        s.id.as_str(),
                        s.video_id.as_str(),
                        s.provider,
                        s.provider_model,
                        s.target_language,
                        s.created_at.to_rfc3339(),
                        s.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        counter!("tlearn_summaries_created_total").increment(1);
        info!(summary_id = %summary.id, video_id = %video_id, "Created summary attempt");
        Ok(summary)
    }

    /// Find the in-flight attempt for a video, if any.
    pub async fn find_processing(&self, video_id: &VideoId) -> DbResult<Option<Summary>> {
        let vid = video_id.as_str().to_string();
        let summary = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM summaries \
                     WHERE video_id = ?1 AND status = 'processing' \
                     ORDER BY created_at DESC LIMIT 1"
                ))?;
                let summary = stmt
                    .query_row(params![vid], |row| Ok(summary_from_row(row)))
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    /// All attempts for a video, newest first.
    pub async fn list_for_video(&self, video_id: &VideoId) -> DbResult<Vec<Summary>> {
        let vid = video_id.as_str().to_string();
        let summaries = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM summaries \
                     WHERE video_id = ?1 ORDER BY created_at DESC"
                ))?;
                let summaries = stmt
                    .query_map(params![vid], |row| Ok(summary_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await?;
        Ok(summaries)
    }

    pub async fn get(&self, summary_id: &SummaryId) -> DbResult<Option<Summary>> {
        let id = summary_id.as_str().to_string();
        let summary = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM summaries WHERE id = ?1"
                ))?;
                let summary = stmt
                    .query_row(params![id], |row| Ok(summary_from_row(row)))
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    /// Most recent completed attempt for a video (chat context source).
    pub async fn latest_completed(&self, video_id: &VideoId) -> DbResult<Option<Summary>> {
        let vid = video_id.as_str().to_string();
        let summary = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM summaries \
                     WHERE video_id = ?1 AND status = 'completed' \
                     ORDER BY created_at DESC LIMIT 1"
                ))?;
                let summary = stmt
                    .query_row(params![vid], |row| Ok(summary_from_row(row)))
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    /// Persist the (possibly truncated) transcript snapshot for an attempt.
    ///
    /// Re-asserts `processing` status; idempotent on a row already in that
    /// state.
    pub async fn store_transcript(&self, summary_id: &SummaryId, transcript: &str) -> DbResult<()> {
        let id = summary_id.as_str().to_string();
        let transcript = transcript.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE summaries SET transcript = ?1, status = 'processing', updated_at = ?2 \
                     WHERE id = ?3",
                    params![transcript, now, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Record pass-1 output: structural analysis, category and the backend
    /// that produced them.
    pub async fn record_pass1(
        &self,
        summary_id: &SummaryId,
        structural_analysis: &str,
        category: Category,
        provider: &str,
        provider_model: &str,
    ) -> DbResult<()> {
        let id = summary_id.as_str().to_string();
        let analysis = structural_analysis.to_string();
        let category = category.as_str();
        let provider = provider.to_string();
        let provider_model = provider_model.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE summaries SET structural_analysis = ?1, category = ?2, \
                     passes_completed = 1, provider = ?3, provider_model = ?4, updated_at = ?5 \
                     WHERE id = ?6",
                    params![analysis, category, provider, provider_model, now, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Record pass-2 output: the deep-summary markdown.
    pub async fn record_pass2(&self, summary_id: &SummaryId, markdown: &str) -> DbResult<()> {
        let id = summary_id.as_str().to_string();
        let markdown = markdown.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE summaries SET markdown = ?1, passes_completed = 2, updated_at = ?2 \
                     WHERE id = ?3",
                    params![markdown, now, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Finalize a successful attempt: final markdown, pass checkpoint,
    /// aggregate token counters, terminal `completed` status.
    pub async fn finalize(
        &self,
        summary_id: &SummaryId,
        markdown: &str,
        passes_completed: u32,
        usage: &TokenUsage,
    ) -> DbResult<()> {
        let id = summary_id.as_str().to_string();
        let markdown = markdown.to_string();
        let usage = *usage;
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE summaries SET markdown = ?1, passes_completed = ?2, \
                     status = 'completed', input_tokens = ?3, output_tokens = ?4, \
                     total_tokens = ?5, updated_at = ?6 WHERE id = ?7",
                    params![
                        markdown,
                        passes_completed as i64,
                        usage.input_tokens as i64,
                        usage.output_tokens as i64,
                        usage.total_tokens as i64,
                        now,
                        id,
                    ],
                )?;
                Ok(())
            })
            .await?;

        counter!("tlearn_summaries_completed_total").increment(1);
        Ok(())
    }

    /// Mark an attempt failed with a descriptive message. Terminal.
    pub async fn mark_failed(&self, summary_id: &SummaryId, message: &str) -> DbResult<()> {
        let id = summary_id.as_str().to_string();
        let message = message.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE summaries SET status = 'failed', error_message = ?1, updated_at = ?2 \
                     WHERE id = ?3",
                    params![message, now, id],
                )?;
                Ok(())
            })
            .await?;

        counter!("tlearn_summaries_failed_total").increment(1);
        Ok(())
    }

    /// Delete an attempt. Returns false when no row matched.
    pub async fn delete(&self, summary_id: &SummaryId) -> DbResult<bool> {
        let id = summary_id.as_str().to_string();
        let deleted = self
            .db
            .connection()
            .call(move |conn| {
                let deleted = conn.execute("DELETE FROM summaries WHERE id = ?1", params![id])?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted > 0)
    }

    /// Merge an on-demand translation into the per-summary map and bump the
    /// usage counters.
    ///
    /// Previously cached languages are never discarded. Does not touch
    /// `status` or the primary `markdown`.
    pub async fn merge_translation(
        &self,
        summary_id: &SummaryId,
        language: &str,
        markdown: &str,
        usage: &TokenUsage,
    ) -> DbResult<()> {
        let id = summary_id.as_str().to_string();
        let language = language.to_string();
        let markdown = markdown.to_string();
        let usage = *usage;
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                let existing: Option<Option<String>> = conn
                    .query_row(
                        "SELECT translations FROM summaries WHERE id = ?1",
                        params![&id],
                        |row| row.get(0),
                    )
                    .optional()?;

                let mut map = parse_translations(existing.flatten().as_deref());
                map.insert(language, markdown);
                let encoded = serde_json::to_string(&map).unwrap_or_default();

                conn.execute(
                    "UPDATE summaries SET translations = ?1, \
                     input_tokens = input_tokens + ?2, output_tokens = output_tokens + ?3, \
                     total_tokens = total_tokens + ?4, updated_at = ?5 WHERE id = ?6",
                    params![
                        encoded,
                        usage.input_tokens as i64,
                        usage.output_tokens as i64,
                        usage.total_tokens as i64,
                        now,
                        id,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Lenient translations decode: a corrupt map loses nothing but the cache.
fn parse_translations(raw: Option<&str>) -> BTreeMap<String, String> {
    raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
}

fn summary_from_row(row: &Row) -> Summary {
    let status = row
        .get::<_, String>(2)
        .ok()
        .and_then(|s| SummaryStatus::parse(&s))
        .unwrap_or(SummaryStatus::Failed);

    Summary {
        id: SummaryId::from_string(row.get::<_, String>(0).unwrap_or_default()),
        video_id: VideoId::from_string(row.get::<_, String>(1).unwrap_or_default()),
        status,
        transcript: row.get(3).unwrap_or_default(),
        structural_analysis: row.get(4).unwrap_or_default(),
        category: row
            .get::<_, Option<String>>(5)
            .unwrap_or_default()
            .map(|s| Category::parse(&s)),
        markdown: row.get(6).unwrap_or_default(),
        passes_completed: row.get::<_, i64>(7).unwrap_or_default() as u32,
        provider: row.get(8).unwrap_or_default(),
        provider_model: row.get(9).unwrap_or_default(),
        target_language: row.get(10).unwrap_or_default(),
        usage: TokenUsage::new(
            row.get::<_, i64>(11).unwrap_or_default() as u32,
            row.get::<_, i64>(12).unwrap_or_default() as u32,
            row.get::<_, i64>(13).unwrap_or_default() as u32,
        ),
        translations: parse_translations(
            row.get::<_, Option<String>>(14).unwrap_or_default().as_deref(),
        ),
        error_message: row.get(15).unwrap_or_default(),
        created_at: row
            .get::<_, String>(16)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(17)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::videos::{UserRepository, VideoRepository};
    use tlearn_models::Video;

    async fn setup() -> (Db, SummaryRepository, VideoId) {
        let db = Db::open_in_memory().await.unwrap();
        UserRepository::new(db.clone())
            .upsert("user-1", None)
            .await
            .unwrap();
        let videos = VideoRepository::new(db.clone(), "user-1");
        let video = Video::new("user-1", "yt-1", "A Video");
        videos.create(&video).await.unwrap();
        (db.clone(), SummaryRepository::new(db), video.id)
    }

    #[tokio::test]
    async fn test_attempt_lifecycle() {
        let (_db, repo, video_id) = setup().await;

        let summary = repo
            .create_processing(&video_id, "gemini", "gemini-2.0-flash", "en")
            .await
            .unwrap();
        assert_eq!(summary.status, SummaryStatus::Processing);
        assert!(repo.find_processing(&video_id).await.unwrap().is_some());

        repo.store_transcript(&summary.id, "[0:00] hello").await.unwrap();
        repo.record_pass1(&summary.id, "{\"category\":\"gaming\"}", Category::Gaming, "gemini", "gemini-2.0-flash")
            .await
            .unwrap();
        repo.record_pass2(&summary.id, "# Summary").await.unwrap();

        let mid = repo.get(&summary.id).await.unwrap().unwrap();
        assert_eq!(mid.passes_completed, 2);
        assert_eq!(mid.status, SummaryStatus::Processing);
        assert_eq!(mid.category, Some(Category::Gaming));

        repo.finalize(&summary.id, "# Summary\n\nfooter", 2, &TokenUsage::new(10, 20, 30))
            .await
            .unwrap();

        let done = repo.get(&summary.id).await.unwrap().unwrap();
        assert_eq!(done.status, SummaryStatus::Completed);
        assert_eq!(done.usage.total_tokens, 30);
        assert!(repo.find_processing(&video_id).await.unwrap().is_none());
        assert_eq!(
            repo.latest_completed(&video_id).await.unwrap().unwrap().id,
            summary.id
        );
    }

    #[tokio::test]
    async fn test_mark_failed_is_terminal() {
        let (_db, repo, video_id) = setup().await;
        let summary = repo
            .create_processing(&video_id, "openai", "gpt-4o-mini", "en")
            .await
            .unwrap();

        repo.mark_failed(&summary.id, "Pass 1 failed: backend error")
            .await
            .unwrap();

        let failed = repo.get(&summary.id).await.unwrap().unwrap();
        assert_eq!(failed.status, SummaryStatus::Failed);
        assert!(failed.error_message.unwrap().starts_with("Pass 1 failed"));
        assert!(repo.find_processing(&video_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_preserves_history() {
        let (_db, repo, video_id) = setup().await;
        let first = repo
            .create_processing(&video_id, "gemini", "gemini-2.0-flash", "en")
            .await
            .unwrap();
        repo.mark_failed(&first.id, "Pass 2 failed: boom").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo
            .create_processing(&video_id, "gemini", "gemini-2.0-flash", "tr")
            .await
            .unwrap();

        let all = repo.list_for_video(&video_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[tokio::test]
    async fn test_merge_translation_preserves_languages() {
        let (_db, repo, video_id) = setup().await;
        let summary = repo
            .create_processing(&video_id, "gemini", "gemini-2.0-flash", "en")
            .await
            .unwrap();
        repo.finalize(&summary.id, "# Doc", 2, &TokenUsage::new(1, 1, 2))
            .await
            .unwrap();

        repo.merge_translation(&summary.id, "tr", "# Belge", &TokenUsage::new(5, 5, 10))
            .await
            .unwrap();
        repo.merge_translation(&summary.id, "de", "# Dokument", &TokenUsage::new(3, 3, 6))
            .await
            .unwrap();

        let row = repo.get(&summary.id).await.unwrap().unwrap();
        assert_eq!(row.translations.get("tr").unwrap(), "# Belge");
        assert_eq!(row.translations.get("de").unwrap(), "# Dokument");
        // 2 + 10 + 6 accumulated
        assert_eq!(row.usage.total_tokens, 18);
        // translations never touch the primary content or status
        assert_eq!(row.markdown.as_deref(), Some("# Doc"));
        assert_eq!(row.status, SummaryStatus::Completed);
    }

    #[tokio::test]
    async fn test_delete() {
        let (_db, repo, video_id) = setup().await;
        let summary = repo
            .create_processing(&video_id, "gemini", "gemini-2.0-flash", "en")
            .await
            .unwrap();

        assert!(repo.delete(&summary.id).await.unwrap());
        assert!(!repo.delete(&summary.id).await.unwrap());
        assert!(repo.get(&summary.id).await.unwrap().is_none());
    }
}
