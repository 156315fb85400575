//! Typed repositories for users and their videos.

use rusqlite::{params, OptionalExtension, Row};
use tracing::{info, warn};

use tlearn_models::{TranscriptDoc, Video, VideoId};

use crate::client::{parse_datetime, Db};
use crate::error::DbResult;
use crate::transcript_cache::{compress_transcript, decompress_transcript};

/// Repository for user records.
pub struct UserRepository {
    db: Db,
}

impl UserRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert or refresh a user row. Called by the sign-in collaborator.
    pub async fn upsert(&self, user_id: &str, email: Option<&str>) -> DbResult<()> {
        let user_id = user_id.to_string();
        let email = email.map(|e| e.to_string());
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO users (id, email) VALUES (?1, ?2)
                       ON CONFLICT(id) DO UPDATE SET email = excluded.email"#,
                    params![user_id, email],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_email(&self, user_id: &str) -> DbResult<Option<String>> {
        let user_id = user_id.to_string();
        let email = self
            .db
            .connection()
            .call(move |conn| {
                let email: Option<Option<String>> = conn
                    .query_row(
                        "SELECT email FROM users WHERE id = ?1",
                        params![user_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(email.flatten())
            })
            .await?;
        Ok(email)
    }
}

/// Repository for one user's videos.
pub struct VideoRepository {
    db: Db,
    user_id: String,
}

impl VideoRepository {
    /// Create a repository scoped to one user.
    pub fn new(db: Db, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }

    /// Insert a video record. Called by the playlist-sync collaborator and
    /// by tests.
    pub async fn create(&self, video: &Video) -> DbResult<()> {
        let v = video.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO videos
                       (id, user_id, youtube_id, title, channel_name, duration, published_at,
                        playlist_id, is_read, is_removed, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
                    params![
                        v.id.as_str(),
                        v.user_id,
                        v.youtube_id,
                        v.title,
                        v.channel_name,
                        v.duration,
                        v.published_at.map(|dt| dt.to_rfc3339()),
                        v.playlist_id,
                        v.is_read as i64,
                        v.is_removed as i64,
                        v.created_at.to_rfc3339(),
                        v.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        info!(video_id = %video.id, youtube_id = %video.youtube_id, "Created video record");
        Ok(())
    }

    /// Look up a video by its platform ID within this user's library.
    pub async fn find_by_youtube_id(&self, youtube_id: &str) -> DbResult<Option<Video>> {
        let user_id = self.user_id.clone();
        let youtube_id = youtube_id.to_string();
        let video = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, youtube_id, title, channel_name, duration, published_at, \
                     playlist_id, is_read, is_removed, created_at, updated_at \
                     FROM videos WHERE user_id = ?1 AND youtube_id = ?2",
                )?;
                let video = stmt
                    .query_row(params![user_id, youtube_id], |row| Ok(video_from_row(row)))
                    .optional()?;
                Ok(video)
            })
            .await?;
        Ok(video)
    }

    /// Get a video by record ID, scoped to this user (ownership check).
    pub async fn get(&self, video_id: &VideoId) -> DbResult<Option<Video>> {
        let user_id = self.user_id.clone();
        let id = video_id.as_str().to_string();
        let video = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, youtube_id, title, channel_name, duration, published_at, \
                     playlist_id, is_read, is_removed, created_at, updated_at \
                     FROM videos WHERE id = ?1 AND user_id = ?2",
                )?;
                let video = stmt
                    .query_row(params![id, user_id], |row| Ok(video_from_row(row)))
                    .optional()?;
                Ok(video)
            })
            .await?;
        Ok(video)
    }

    /// Load the cached transcript for a video, if any.
    ///
    /// Any decode failure counts as a cache miss.
    pub async fn load_cached_transcript(&self, youtube_id: &str) -> DbResult<Option<TranscriptDoc>> {
        let user_id = self.user_id.clone();
        let youtube_id = youtube_id.to_string();
        let blob: Option<Vec<u8>> = self
            .db
            .connection()
            .call(move |conn| {
                let blob: Option<Option<Vec<u8>>> = conn
                    .query_row(
                        "SELECT transcript_data FROM videos WHERE user_id = ?1 AND youtube_id = ?2",
                        params![user_id, youtube_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(blob.flatten())
            })
            .await?;

        Ok(blob.as_deref().and_then(decompress_transcript))
    }

    /// Persist a fetched transcript so future requests skip the network.
    pub async fn store_cached_transcript(
        &self,
        youtube_id: &str,
        doc: &TranscriptDoc,
    ) -> DbResult<()> {
        let compressed = compress_transcript(doc)?;
        let user_id = self.user_id.clone();
        let yt = youtube_id.to_string();
        let updated = self
            .db
            .connection()
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE videos SET transcript_data = ?1 WHERE user_id = ?2 AND youtube_id = ?3",
                    params![compressed, user_id, yt],
                )?;
                Ok(updated)
            })
            .await?;

        if updated == 0 {
            warn!(youtube_id = %youtube_id, "Transcript cache write matched no video row");
        }
        Ok(())
    }
}

fn video_from_row(row: &Row) -> Video {
    Video {
        id: VideoId::from_string(row.get::<_, String>(0).unwrap_or_default()),
        user_id: row.get(1).unwrap_or_default(),
        youtube_id: row.get(2).unwrap_or_default(),
        title: row.get(3).unwrap_or_default(),
        channel_name: row.get(4).unwrap_or_default(),
        duration: row.get(5).unwrap_or_default(),
        published_at: row
            .get::<_, Option<String>>(6)
            .unwrap_or_default()
            .and_then(|s| parse_datetime(&s)),
        playlist_id: row.get(7).unwrap_or_default(),
        is_read: row.get::<_, i64>(8).unwrap_or_default() != 0,
        is_removed: row.get::<_, i64>(9).unwrap_or_default() != 0,
        created_at: row
            .get::<_, String>(10)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(chrono::Utc::now),
        updated_at: row
            .get::<_, String>(11)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(chrono::Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlearn_models::TranscriptSegment;

    async fn setup() -> (Db, VideoRepository) {
        let db = Db::open_in_memory().await.unwrap();
        UserRepository::new(db.clone())
            .upsert("user-1", Some("user@example.com"))
            .await
            .unwrap();
        let repo = VideoRepository::new(db.clone(), "user-1");
        (db, repo)
    }

    #[tokio::test]
    async fn test_create_and_find_video() {
        let (_db, repo) = setup().await;
        let video = Video::new("user-1", "dQw4w9WgXcQ", "Test Video").with_channel("Test Channel");
        repo.create(&video).await.unwrap();

        let found = repo.find_by_youtube_id("dQw4w9WgXcQ").await.unwrap().unwrap();
        assert_eq!(found.id, video.id);
        assert_eq!(found.channel_name.as_deref(), Some("Test Channel"));

        assert!(repo.find_by_youtube_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ownership_scoping() {
        let (db, repo) = setup().await;
        let video = Video::new("user-1", "abc", "Mine");
        repo.create(&video).await.unwrap();

        let other = VideoRepository::new(db, "user-2");
        assert!(other.get(&video.id).await.unwrap().is_none());
        assert!(repo.get(&video.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transcript_cache_roundtrip() {
        let (_db, repo) = setup().await;
        let video = Video::new("user-1", "abc", "Cached");
        repo.create(&video).await.unwrap();

        assert!(repo.load_cached_transcript("abc").await.unwrap().is_none());

        let doc = TranscriptDoc {
            video_id: "abc".into(),
            language: "en".into(),
            segments: vec![TranscriptSegment {
                text: "hello".into(),
                start: 0.0,
                duration: 1.0,
            }],
        };
        repo.store_cached_transcript("abc", &doc).await.unwrap();

        let cached = repo.load_cached_transcript("abc").await.unwrap().unwrap();
        assert_eq!(cached, doc);
    }
}
