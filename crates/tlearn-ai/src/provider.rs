//! Model provider gateway.
//!
//! Uniform interface over the supported text-generation backends: Gemini
//! (with native search grounding) and the OpenAI-compatible family
//! (including self-hosted endpoints via a base-URL override). Returns the
//! sanitized text plus token usage; callers persist both as needed. The
//! gateway itself keeps no state beyond the HTTP client.

use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tlearn_models::{AiProvider, AiSettings, TokenUsage};

use crate::error::{AiError, AiResult};
use crate::sanitize::strip_reasoning;
use crate::tools::{execute_tool, ToolSpec};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Turn cap for the function-calling loop.
const MAX_TOOL_TURNS: usize = 5;

/// Sentinel text returned when the tool loop exhausts its turn budget.
pub const TOOL_LIMIT_SENTINEL: &str = "Error: Maximum tool execution turns reached.";

/// Text plus token usage from one gateway invocation (all turns included).
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub usage: TokenUsage,
}

/// Gateway over the configured text-generation backends.
pub struct Gateway {
    http: Client,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    /// Generate text with the user's configured backend.
    ///
    /// A missing API key is a hard precondition failure; everything else is
    /// reported as a backend/network error for the caller to handle.
    pub async fn generate(
        &self,
        settings: &AiSettings,
        prompt: &str,
        system_instruction: Option<&str>,
        tools: Option<&ToolSpec>,
    ) -> AiResult<GenerationResult> {
        let api_key = settings.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        counter!("tlearn_gateway_calls_total", "provider" => settings.provider.as_str())
            .increment(1);

        match settings.provider {
            AiProvider::Gemini => {
                self.generate_gemini(settings, api_key, prompt, system_instruction, tools)
                    .await
            }
            AiProvider::Openai | AiProvider::OpenaiCompatible => {
                self.generate_openai(settings, api_key, prompt, system_instruction, tools)
                    .await
            }
        }
    }

    /// Call Gemini's generateContent endpoint.
    async fn generate_gemini(
        &self,
        settings: &AiSettings,
        api_key: &str,
        prompt: &str,
        system_instruction: Option<&str>,
        tools: Option<&ToolSpec>,
    ) -> AiResult<GenerationResult> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, settings.model, api_key
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: system_instruction.map(|text| GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }),
            // Search grounding is declared as a single opaque tool; Gemini
            // executes it server-side, so there is no dispatch loop here.
            tools: match tools {
                Some(ToolSpec::GoogleSearch) => Some(vec![json!({ "googleSearch": {} })]),
                _ => None,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::backend(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::backend(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AiError::invalid_response(format!("Failed to parse Gemini response: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AiError::invalid_response("No content in Gemini response"))?;

        let usage = gemini_response.usage_metadata.unwrap_or_default();
        debug!(model = %settings.model, total_tokens = usage.total_token_count, "Gemini call complete");

        Ok(GenerationResult {
            text: strip_reasoning(&text),
            usage: TokenUsage::new(
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count,
            ),
        })
    }

    /// Call an OpenAI-compatible chat-completions endpoint, running the
    /// function-calling loop when tools are supplied.
    async fn generate_openai(
        &self,
        settings: &AiSettings,
        api_key: &str,
        prompt: &str,
        system_instruction: Option<&str>,
        tools: Option<&ToolSpec>,
    ) -> AiResult<GenerationResult> {
        let base = match (settings.provider, settings.base_url.as_deref()) {
            (AiProvider::OpenaiCompatible, Some(base_url)) => base_url,
            _ => OPENAI_API_BASE,
        };
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));

        let mut messages: Vec<Value> = Vec::new();
        if let Some(system) = system_instruction {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let functions = match tools {
            Some(ToolSpec::Functions(fns)) if !fns.is_empty() => Some(fns),
            _ => None,
        };

        // Plain generation without tools.
        let Some(functions) = functions else {
            let body = json!({ "model": settings.model.as_str(), "messages": &messages });
            let (message, usage) = self.call_chat_completions(&url, api_key, &body).await?;
            let text = message
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or_default();
            return Ok(GenerationResult {
                text: strip_reasoning(text),
                usage: TokenUsage::new(
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens,
                ),
            });
        };

        // Tool loop: call the model, dispatch requested tools, feed results
        // back. Bounded turns, usage accumulated across every turn.
        let mut total_input = 0u32;
        let mut total_output = 0u32;

        for turn in 0..MAX_TOOL_TURNS {
            let body = json!({
                "model": settings.model.as_str(),
                "messages": &messages,
                "tools": functions,
                "tool_choice": "auto",
            });

            let (message, usage) = self.call_chat_completions(&url, api_key, &body).await?;
            total_input = total_input.saturating_add(usage.prompt_tokens);
            total_output = total_output.saturating_add(usage.completion_tokens);

            let tool_calls: Vec<ToolCall> = message
                .get("tool_calls")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();

            if tool_calls.is_empty() {
                let text = message
                    .get("content")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default();
                return Ok(GenerationResult {
                    text: strip_reasoning(text),
                    usage: TokenUsage::new(total_input, total_output, total_input + total_output),
                });
            }

            messages.push(message);

            for call in tool_calls {
                let args: Value =
                    serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
                let result = execute_tool(&self.http, &call.function.name, &args).await;

                info!(
                    tool = %call.function.name,
                    turn = turn,
                    result_preview = %result.chars().take(100).collect::<String>(),
                    "Tool call dispatched"
                );

                messages.push(json!({
                    "tool_call_id": call.id,
                    "role": "tool",
                    "content": result,
                }));
            }
        }

        // Turn budget exhausted: return a usable sentinel string so callers
        // still get text + usage rather than an error.
        warn!(model = %settings.model, "Tool loop reached maximum turns");
        Ok(GenerationResult {
            text: TOOL_LIMIT_SENTINEL.to_string(),
            usage: TokenUsage::new(total_input, total_output, total_input + total_output),
        })
    }

    async fn call_chat_completions(
        &self,
        url: &str,
        api_key: &str,
        body: &Value,
    ) -> AiResult<(Value, ChatUsage)> {
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::backend(format!("Chat completions request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::backend(format!(
                "Chat completions returned {}: {}",
                status, error_text
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AiError::invalid_response(format!("Failed to parse chat completions response: {}", e))
        })?;

        let message = data
            .pointer("/choices/0/message")
            .cloned()
            .ok_or_else(|| AiError::invalid_response("No choices in chat completions response"))?;

        let usage: ChatUsage = data
            .get("usage")
            .cloned()
            .and_then(|u| serde_json::from_value(u).ok())
            .unwrap_or_default();

        Ok((message, usage))
    }
}

// Gemini wire types.

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u32,
}

// OpenAI wire types (the subset the loop needs; messages stay raw JSON so
// assistant turns can be echoed back verbatim).

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    name: String,
    arguments: String,
}
