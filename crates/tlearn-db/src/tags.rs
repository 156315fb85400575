//! Typed repository for tags.
//!
//! Tag CRUD itself is collaborator territory; the pipeline only reads tag
//! names when exporting.

use rusqlite::params;

use tlearn_models::{Tag, VideoId};

use crate::client::Db;
use crate::error::DbResult;

/// Repository for one user's tags.
pub struct TagRepository {
    db: Db,
    user_id: String,
}

impl TagRepository {
    pub fn new(db: Db, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }

    pub async fn create(&self, name: &str) -> DbResult<Tag> {
        let tag = Tag::new(&self.user_id, name);
        let t = tag.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tags (id, user_id, name) VALUES (?1, ?2, ?3)",
                    params![t.id, t.user_id, t.name],
                )?;
                Ok(())
            })
            .await?;
        Ok(tag)
    }

    pub async fn attach(&self, video_id: &VideoId, tag_id: &str) -> DbResult<()> {
        let vid = video_id.as_str().to_string();
        let tag_id = tag_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO video_tags (video_id, tag_id) VALUES (?1, ?2)",
                    params![vid, tag_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Tag names attached to a video, alphabetical.
    pub async fn names_for_video(&self, video_id: &VideoId) -> DbResult<Vec<String>> {
        let vid = video_id.as_str().to_string();
        let names = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.name FROM tags t \
                     JOIN video_tags vt ON vt.tag_id = t.id \
                     WHERE vt.video_id = ?1 ORDER BY t.name",
                )?;
                let names = stmt
                    .query_map(params![vid], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::videos::{UserRepository, VideoRepository};
    use tlearn_models::Video;

    #[tokio::test]
    async fn test_tags_for_video() {
        let db = Db::open_in_memory().await.unwrap();
        UserRepository::new(db.clone()).upsert("user-1", None).await.unwrap();
        let videos = VideoRepository::new(db.clone(), "user-1");
        let video = Video::new("user-1", "yt-1", "A Video");
        videos.create(&video).await.unwrap();

        let tags = TagRepository::new(db, "user-1");
        let rust = tags.create("rust").await.unwrap();
        let learning = tags.create("learning").await.unwrap();
        tags.attach(&video.id, &rust.id).await.unwrap();
        tags.attach(&video.id, &learning.id).await.unwrap();
        // duplicate attach is a no-op
        tags.attach(&video.id, &rust.id).await.unwrap();

        let names = tags.names_for_video(&video.id).await.unwrap();
        assert_eq!(names, vec!["learning".to_string(), "rust".to_string()]);
    }
}
