//! SQLite persistence layer.
//!
//! This crate provides:
//! - A cheap-to-clone [`Db`] handle over an async SQLite connection
//! - Typed repositories per aggregate (videos, summaries, chat, tags,
//!   settings)
//! - The gzip-compressed transcript cache stored on video rows

pub mod chat;
pub mod client;
pub mod error;
pub mod schema;
pub mod settings;
pub mod summaries;
pub mod tags;
pub mod transcript_cache;
pub mod videos;

pub use chat::ChatRepository;
pub use client::Db;
pub use error::{DbError, DbResult};
pub use settings::SettingsRepository;
pub use summaries::SummaryRepository;
pub use tags::TagRepository;
pub use videos::{UserRepository, VideoRepository};
