//! Summary attempts and their lifecycle.
//!
//! A `Summary` row represents one attempt at summarizing a video. Rows are
//! never overwritten by later attempts; each "generate" request creates a new
//! one. `updated_at` doubles as the heartbeat for staleness detection.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;
use crate::video::VideoId;

/// Language code a summary defaults to when none is requested.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Seconds since the last heartbeat after which a processing summary is
/// considered stuck and may be reaped by the next admission check.
pub const STALE_THRESHOLD_SECS: i64 = 600;

/// Unique identifier for a summary attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryId(pub String);

impl SummaryId {
    /// Generate a new random summary ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SummaryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SummaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// An attempt is in flight; the row is mutated in place by each pass.
    #[default]
    Processing,
    /// Terminal: the final markdown is available.
    Completed,
    /// Terminal: `error_message` describes which step failed.
    Failed,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Processing => "processing",
            SummaryStatus::Completed => "completed",
            SummaryStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more pipeline writes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SummaryStatus::Completed | SummaryStatus::Failed)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(SummaryStatus::Processing),
            "completed" => Some(SummaryStatus::Completed),
            "failed" => Some(SummaryStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token usage counters, accumulated monotonically across passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32, total_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Add another usage sample to this accumulator.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// One summarization attempt for a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub video_id: VideoId,
    pub status: SummaryStatus,

    /// Transcript snapshot used by this attempt (possibly truncated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// Raw pass-1 output, typically JSON text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural_analysis: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Final rendered document; set after pass 2, replaced by pass 3 when a
    /// translation runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,

    /// Checkpoint counter: 1 after structural analysis, 2 after the deep
    /// summary, 3 if translation ran.
    pub passes_completed: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_model: Option<String>,

    pub target_language: String,

    #[serde(flatten)]
    pub usage: TokenUsage,

    /// Cached on-demand translations, keyed by language code. Populated
    /// lazily, independent of the main pipeline.
    #[serde(default)]
    pub translations: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check whether a processing attempt has gone stale.
    ///
    /// `updated_at` is bumped by every pipeline write, so a processing row
    /// whose last update is older than the threshold has no live writer.
    pub fn is_stale(&self, threshold_secs: i64) -> bool {
        !self.is_terminal() && self.stale_elapsed_secs() > threshold_secs
    }

    /// Seconds elapsed since the last heartbeat.
    pub fn stale_elapsed_secs(&self) -> i64 {
        (Utc::now() - self.updated_at).num_seconds()
    }
}
