//! Per-user AI provider settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which text-generation backend a user has configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AiProvider {
    #[default]
    Gemini,
    Openai,
    /// OpenAI-compatible endpoints (Ollama, LM Studio, vLLM, ...) reached via
    /// a custom base URL.
    OpenaiCompatible,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::Openai => "openai",
            AiProvider::OpenaiCompatible => "openai-compatible",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gemini" => Some(AiProvider::Gemini),
            "openai" => Some(AiProvider::Openai),
            "openai-compatible" => Some(AiProvider::OpenaiCompatible),
            _ => None,
        }
    }

    /// Whether the backend speaks the function-calling protocol. Gemini gets
    /// its search grounding declared as a single opaque tool instead.
    pub fn supports_function_tools(&self) -> bool {
        matches!(self, AiProvider::Openai | AiProvider::OpenaiCompatible)
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved AI settings for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub model: String,
    /// Absent key is a hard precondition failure for the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override for self-hosted/compatible backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProvider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}
