//! AI gateway and summarization pipeline.
//!
//! This crate owns the hard core of the backend:
//! - [`provider::Gateway`]: a uniform interface over Gemini and
//!   OpenAI-compatible text-generation backends, including the
//!   function-calling loop and reasoning-leak sanitization
//! - [`transcript::TranscriptSource`]: timed-transcript fetching with a
//!   persistent cache
//! - [`summarizer::SummarizationPipeline`]: the multi-pass state machine
//!   (structural analysis, deep summary, optional translation)
//! - [`chat`]: follow-up Q&A and suggested questions over persisted summaries
//! - [`export`]: best-effort markdown artifact export

pub mod chat;
pub mod error;
pub mod export;
pub mod prompts;
pub mod provider;
pub mod sanitize;
pub mod summarizer;
pub mod tools;
pub mod transcript;

pub use error::{AiError, AiResult};
pub use provider::{Gateway, GenerationResult};
pub use summarizer::{PipelineOutcome, SummarizationPipeline, MAX_TRANSCRIPT_CHARS};
pub use tools::ToolSpec;
pub use transcript::{TranscriptError, TranscriptSource};
