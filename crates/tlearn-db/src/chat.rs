//! Typed repository for chat messages.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use tlearn_models::{ChatMessage, ChatRole, VideoId};

use crate::client::{parse_datetime, Db};
use crate::error::DbResult;

/// Repository for a video's append-only conversation.
pub struct ChatRepository {
    db: Db,
}

impl ChatRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Append a message. Messages are never mutated after creation.
    pub async fn append(
        &self,
        video_id: &VideoId,
        role: ChatRole,
        content: &str,
    ) -> DbResult<ChatMessage> {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.clone(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let m = message.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chat_messages (id, video_id, role, content, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        m.id,
                        m.video_id.as_str(),
                        m.role.as_str(),
                        m.content,
                        m.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(message)
    }

    /// Full conversation in chronological order.
    pub async fn history(&self, video_id: &VideoId) -> DbResult<Vec<ChatMessage>> {
        let vid = video_id.as_str().to_string();
        let messages = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, video_id, role, content, created_at FROM chat_messages \
                     WHERE video_id = ?1 ORDER BY created_at ASC",
                )?;
                let messages = stmt
                    .query_map(params![vid], |row| Ok(message_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(messages)
            })
            .await?;
        Ok(messages)
    }

    /// Most recent `limit` messages, returned in chronological order.
    pub async fn recent(&self, video_id: &VideoId, limit: u32) -> DbResult<Vec<ChatMessage>> {
        let vid = video_id.as_str().to_string();
        let mut messages = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, video_id, role, content, created_at FROM chat_messages \
                     WHERE video_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                )?;
                let messages = stmt
                    .query_map(params![vid, limit], |row| Ok(message_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(messages)
            })
            .await?;
        messages.reverse();
        Ok(messages)
    }
}

fn message_from_row(row: &Row) -> ChatMessage {
    ChatMessage {
        id: row.get(0).unwrap_or_default(),
        video_id: VideoId::from_string(row.get::<_, String>(1).unwrap_or_default()),
        role: row
            .get::<_, String>(2)
            .ok()
            .and_then(|s| ChatRole::parse(&s))
            .unwrap_or(ChatRole::User),
        content: row.get(3).unwrap_or_default(),
        created_at: row
            .get::<_, String>(4)
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

    async fn setup() -> (ChatRepository, VideoId) {
        let db = Db::open_in_memory().await.unwrap();
        UserRepository::new(db.clone()).upsert("user-1", None).await.unwrap();
        let videos = VideoRepository::new(db.clone(), "user-1");
        let video = Video::new("user-1", "yt-1", "A Video");
        videos.create(&video).await.unwrap();
        (ChatRepository::new(db), video.id)
    }

    #[tokio::test]
    async fn test_append_and_ordering() {
        let (repo, video_id) = setup().await;
        repo.append(&video_id, ChatRole::User, "first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.append(&video_id, ChatRole::Assistant, "second").await.unwrap();

        let history = repo.history(&video_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].content, "second");
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_recent_window_is_chronological() {
        let (repo, video_id) = setup().await;
        for i in 0..5 {
            repo.append(&video_id, ChatRole::User, &format!("msg {}", i))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        }

        let recent = repo.recent(&video_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "msg 3");
        assert_eq!(recent[1].content, "msg 4");
    }
}
