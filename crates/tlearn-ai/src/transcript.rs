//! Timed-transcript fetching.
//!
//! Fetches the watch page, extracts the caption-track list, and downloads the
//! timedtext XML for the requested language, falling back once to any
//! available language. A video with no caption data at all is a
//! distinguishable, non-retryable condition.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use tlearn_db::VideoRepository;
use tlearn_models::{TranscriptDoc, TranscriptSegment};

const WATCH_URL: &str = "https://www.youtube.com/watch";

#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Captions are turned off for the video. Not retryable; no language
    /// fallback applies.
    #[error("Transcripts are disabled for this video")]
    Disabled,

    #[error("No transcript found for this video")]
    NotFound,

    #[error("Failed to fetch transcript: {0}")]
    Fetch(String),
}

impl TranscriptError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TranscriptError::Disabled)
    }
}

/// One entry from the watch page's caption-track list.
#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
}

/// Transcript fetcher over the platform's caption endpoints.
pub struct TranscriptSource {
    http: Client,
}

impl Default for TranscriptSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptSource {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Fetch a timed transcript, preferring `lang` and falling back once to
    /// any available caption track.
    pub async fn fetch(&self, youtube_id: &str, lang: &str) -> Result<TranscriptDoc, TranscriptError> {
        let page = self
            .http
            .get(WATCH_URL)
            .query(&[("v", youtube_id)])
            .send()
            .await
            .map_err(|e| TranscriptError::Fetch(format!("watch page request failed: {}", e)))?
            .text()
            .await
            .map_err(|e| TranscriptError::Fetch(format!("watch page read failed: {}", e)))?;

        let tracks = extract_caption_tracks(&page)?;

        // Requested language first, then any language.
        let attempts: [Option<&str>; 2] = [Some(lang), None];
        for attempt in attempts {
            let track = match attempt {
                Some(code) => tracks.iter().find(|t| t.language_code == code),
                None => tracks.first(),
            };
            let Some(track) = track else { continue };

            let xml = match self.http.get(&track.base_url).send().await {
                Ok(r) => r
                    .text()
                    .await
                    .map_err(|e| TranscriptError::Fetch(format!("timedtext read failed: {}", e)))?,
                Err(e) => {
                    warn!(language = %track.language_code, error = %e, "Timedtext request failed");
                    continue;
                }
            };

            let segments = parse_timedtext(&xml);
            if segments.is_empty() {
                continue;
            }

            info!(
                youtube_id = %youtube_id,
                language = %track.language_code,
                segments = segments.len(),
                "Fetched transcript"
            );

            return Ok(TranscriptDoc {
                video_id: youtube_id.to_string(),
                language: track.language_code.clone(),
                segments,
            });
        }

        Err(TranscriptError::NotFound)
    }

    /// Cache-through fetch: check the video row first, fetch on miss, write
    /// back on success. Cache write failures are logged, never fatal.
    pub async fn fetch_with_cache(
        &self,
        videos: &VideoRepository,
        youtube_id: &str,
        lang: &str,
    ) -> Result<TranscriptDoc, TranscriptError> {
        match videos.load_cached_transcript(youtube_id).await {
            Ok(Some(cached)) => {
                debug!(youtube_id = %youtube_id, "Transcript cache hit");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(youtube_id = %youtube_id, error = %e, "Transcript cache read failed"),
        }

        let doc = self.fetch(youtube_id, lang).await?;

        if let Err(e) = videos.store_cached_transcript(youtube_id, &doc).await {
            warn!(youtube_id = %youtube_id, error = %e, "Failed to cache transcript");
        }

        Ok(doc)
    }
}

/// Extract the caption-track list from the watch page HTML.
///
/// A page without any `captionTracks` payload means captions are disabled
/// for the video.
fn extract_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let re = Regex::new(r#""captionTracks":(\[.*?\])"#).unwrap();
    let Some(captures) = re.captures(html) else {
        return Err(TranscriptError::Disabled);
    };

    serde_json::from_str(&captures[1])
        .map_err(|e| TranscriptError::Fetch(format!("caption track list parse failed: {}", e)))
}

/// Parse a timedtext XML document into transcript segments.
fn parse_timedtext(xml: &str) -> Vec<TranscriptSegment> {
    let mut reader = Reader::from_str(xml);

    let mut segments = Vec::new();
    let mut current: Option<(f64, f64)> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"text" => {
                let mut start = 0.0;
                let mut duration = 0.0;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().unwrap_or_default();
                    match attr.key.as_ref() {
                        b"start" => start = value.parse().unwrap_or(0.0),
                        b"dur" => duration = value.parse().unwrap_or(0.0),
                        _ => {}
                    }
                }
                current = Some((start, duration));
                buffer.clear();
            }
            Ok(Event::Text(e)) => {
                if current.is_some() {
                    buffer.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current.is_some() {
                    let raw = format!("&{};", e.decode().unwrap_or_default());
                    match quick_xml::escape::unescape(&raw) {
                        Ok(resolved) => buffer.push_str(&resolved),
                        Err(_) => buffer.push_str(&raw),
                    }
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"text" => {
                if let Some((start, duration)) = current.take() {
                    let text = decode_entities(buffer.trim());
                    if !text.is_empty() {
                        segments.push(TranscriptSegment {
                            text,
                            start,
                            duration,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Timedtext XML parse error");
                break;
            }
            _ => {}
        }
    }

    segments
}

/// Decode the double-escaped HTML entities timedtext payloads carry
/// (`&amp;#39;` arrives as `&#39;` after XML unescaping).
fn decode_entities(text: &str) -> String {
    let numeric = Regex::new(r"&#(\d+);").unwrap();
    let decoded = numeric.replace_all(text, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    decoded
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEDTEXT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<transcript>
    <text start="0.12" dur="2.5">so let&amp;#39;s get started</text>
    <text start="2.62" dur="3.1">today we cover &lt;traits&gt;</text>
    <text start="5.72" dur="1.0"></text>
    <text start="6.72" dur="2.0">and that&#39;s it</text>
</transcript>"#;

    #[test]
    fn test_parse_timedtext() {
        let segments = parse_timedtext(TIMEDTEXT);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "so let's get started");
        assert_eq!(segments[0].start, 0.12);
        assert_eq!(segments[0].duration, 2.5);
        assert_eq!(segments[1].text, "today we cover <traits>");
        assert_eq!(segments[2].text, "and that's it");
    }

    #[test]
    fn test_parse_timedtext_garbage() {
        assert!(parse_timedtext("not xml at all").is_empty());
        assert!(parse_timedtext("").is_empty());
    }

    #[test]
    fn test_extract_caption_tracks() {
        let html = r#"...,"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://example.com/timedtext?lang=en","languageCode":"en"},{"baseUrl":"https://example.com/timedtext?lang=de","languageCode":"de"}]}},..."#;
        let tracks = extract_caption_tracks(html).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "en");
        assert!(tracks[1].base_url.contains("lang=de"));
    }

    #[test]
    fn test_missing_caption_tracks_means_disabled() {
        let err = extract_caption_tracks("<html>no captions here</html>").unwrap_err();
        assert!(matches!(err, TranscriptError::Disabled));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fetch_errors_are_retryable() {
        assert!(TranscriptError::NotFound.is_retryable());
        assert!(TranscriptError::Fetch("timeout".into()).is_retryable());
    }
}
