//! Transcript cache codec.
//!
//! Cached transcripts are stored on the owning video row as gzip-compressed
//! JSON to keep large caption payloads cheap. Corrupt or unreadable cache
//! data is treated as a miss, never as an error.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;

use tlearn_models::TranscriptDoc;

use crate::error::{DbError, DbResult};

/// Compress a transcript document to gzip bytes.
pub fn compress_transcript(doc: &TranscriptDoc) -> DbResult<Vec<u8>> {
    let json = serde_json::to_vec(doc)
        .map_err(|e| DbError::serialization(format!("Failed to encode transcript: {}", e)))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| DbError::serialization(format!("Failed to gzip transcript: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| DbError::serialization(format!("Failed to finish gzip encoding: {}", e)))
}

/// Decompress gzip bytes back into a transcript document.
///
/// Returns `None` if decompression or decoding fails (treated as cache miss).
pub fn decompress_transcript(data: &[u8]) -> Option<TranscriptDoc> {
    let mut decoder = GzDecoder::new(data);
    let mut json = String::new();

    if let Err(e) = decoder.read_to_string(&mut json) {
        warn!(error = %e, "Failed to decompress transcript cache");
        return None;
    }

    match serde_json::from_str(&json) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(error = %e, "Failed to decode transcript cache");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlearn_models::TranscriptSegment;

    fn sample_doc() -> TranscriptDoc {
        TranscriptDoc {
            video_id: "dQw4w9WgXcQ".into(),
            language: "en".into(),
            segments: vec![TranscriptSegment {
                text: "never gonna give you up".into(),
                start: 43.0,
                duration: 2.0,
            }],
        }
    }

    #[test]
    fn test_compress_decompress_roundtrip() {
        let doc = sample_doc();
        let compressed = compress_transcript(&doc).expect("compress should succeed");
        assert!(!compressed.is_empty());

        let decompressed = decompress_transcript(&compressed).expect("decompress should succeed");
        assert_eq!(doc, decompressed);
    }

    #[test]
    fn test_decompress_corrupt_data() {
        assert!(decompress_transcript(b"not gzip data at all").is_none());
    }

    #[test]
    fn test_decompress_valid_gzip_invalid_json() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{ not json").unwrap();
        let data = encoder.finish().unwrap();
        assert!(decompress_transcript(&data).is_none());
    }
}
