//! Typed repository for per-user AI settings.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use tlearn_models::{AiProvider, AiSettings};

use crate::client::Db;
use crate::error::DbResult;

/// Repository resolving the AI backend configuration per user.
pub struct SettingsRepository {
    db: Db,
}

impl SettingsRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Resolve settings for a user. Returns defaults when no row exists.
    pub async fn get(&self, user_id: &str) -> DbResult<AiSettings> {
        let uid = user_id.to_string();
        let row = self
            .db
            .connection()
            .call(move |conn| {
                let row: Option<(String, String, Option<String>, Option<String>)> = conn
                    .query_row(
                        "SELECT ai_provider, ai_model, api_key, base_url \
                         FROM user_settings WHERE user_id = ?1",
                        params![uid],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let defaults = AiSettings::default();
        Ok(match row {
            Some((provider, model, api_key, base_url)) => AiSettings {
                provider: AiProvider::parse(&provider).unwrap_or(defaults.provider),
                model,
                api_key,
                base_url,
            },
            None => defaults,
        })
    }

    /// Insert or replace a user's settings.
    pub async fn upsert(&self, user_id: &str, settings: &AiSettings) -> DbResult<()> {
        let uid = user_id.to_string();
        let s = settings.clone();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO user_settings (user_id, ai_provider, ai_model, api_key, base_url, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(user_id) DO UPDATE SET
                           ai_provider = excluded.ai_provider,
                           ai_model = excluded.ai_model,
                           api_key = excluded.api_key,
                           base_url = excluded.base_url,
                           updated_at = excluded.updated_at"#,
                    params![uid, s.provider.as_str(), s.model, s.api_key, s.base_url, now],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
