pub const SCHEMA: &str = r#"
-- users table (populated by the sign-in collaborator)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- videos table (populated by the playlist-sync collaborator)
CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    youtube_id TEXT NOT NULL,
    title TEXT NOT NULL,
    channel_name TEXT,
    duration TEXT,
    published_at TEXT,
    playlist_id TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    is_removed INTEGER NOT NULL DEFAULT 0,
    transcript_data BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, youtube_id)
);

CREATE INDEX IF NOT EXISTS idx_videos_user_youtube ON videos(user_id, youtube_id);
CREATE INDEX IF NOT EXISTS idx_videos_playlist ON videos(playlist_id);

-- summaries table: one row per summarization attempt, never overwritten.
-- updated_at is the heartbeat used for staleness detection.
CREATE TABLE IF NOT EXISTS summaries (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'processing',
    transcript TEXT,
    structural_analysis TEXT,
    category TEXT,
    markdown TEXT,
    passes_completed INTEGER NOT NULL DEFAULT 0,
    provider TEXT,
    provider_model TEXT,
    target_language TEXT NOT NULL DEFAULT 'en',
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0,
    translations TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_summaries_video_id ON summaries(video_id);
CREATE INDEX IF NOT EXISTS idx_summaries_video_status ON summaries(video_id, status);

-- chat_messages table: append-only conversation per video
CREATE TABLE IF NOT EXISTS chat_messages (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_video ON chat_messages(video_id, created_at);

-- tags + join table
CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE(user_id, name)
);

CREATE TABLE IF NOT EXISTS video_tags (
    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (video_id, tag_id)
);

-- per-user AI settings
CREATE TABLE IF NOT EXISTS user_settings (
    user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    ai_provider TEXT NOT NULL DEFAULT 'gemini',
    ai_model TEXT NOT NULL DEFAULT 'gemini-2.0-flash',
    api_key TEXT,
    base_url TEXT,
    updated_at TEXT NOT NULL
);
"#;
