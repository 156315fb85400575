//! Timed transcripts.

use serde::{Deserialize, Serialize};

/// One caption segment with timing in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// A full timed transcript for one video, as fetched (and cached).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDoc {
    /// Platform video ID the transcript belongs to.
    pub video_id: String,
    /// Detected caption language code.
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptDoc {
    /// Render segments as `[M:SS] text` lines for prompt consumption.
    pub fn to_timed_text(&self) -> String {
        self.segments
            .iter()
            .map(|seg| {
                let minutes = (seg.start / 60.0).floor() as u64;
                let seconds = (seg.start % 60.0).floor() as u64;
                format!("[{}:{:02}] {}", minutes, seconds, seg.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
