//! Search tool declarations and executors.
//!
//! Gemini gets its native Google Search grounding declared as a single
//! opaque tool; OpenAI-compatible backends get function-calling declarations
//! whose calls the gateway dispatches here. Tool executors always return a
//! string (including error strings) so a failed tool never aborts the turn:
//! the model sees the error text and can recover.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use tlearn_models::AiProvider;

const SERPER_API_URL: &str = "https://google.serper.dev/search";
const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Tool configuration handed to the gateway.
#[derive(Debug, Clone)]
pub enum ToolSpec {
    /// Gemini's native search grounding; no local dispatch involved.
    GoogleSearch,
    /// OpenAI function-calling declarations dispatched by the tool loop.
    Functions(Vec<Value>),
}

/// Search tool configuration for the given provider, if it supports one.
pub fn search_tools(provider: AiProvider) -> Option<ToolSpec> {
    match provider {
        AiProvider::Gemini => Some(ToolSpec::GoogleSearch),
        AiProvider::Openai | AiProvider::OpenaiCompatible => {
            Some(ToolSpec::Functions(openai_search_functions()))
        }
    }
}

/// Function declarations for the OpenAI-compatible tool loop.
pub fn openai_search_functions() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "search_google",
                "description": "Search the web for current information, facts, or recent events. Uses Google Search via Serper.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "The search query to use." }
                    },
                    "required": ["query"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "search_wikipedia",
                "description": "Search Wikipedia for general knowledge, history, definitions, and summaries of topics.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "The search query (topic name) to use." }
                    },
                    "required": ["query"]
                }
            }
        }),
    ]
}

/// Dispatch a tool call by name. Unknown names resolve to an inline error
/// string fed back to the model, not a hard failure.
pub async fn execute_tool(http: &Client, name: &str, args: &Value) -> String {
    let query = args.get("query").and_then(|q| q.as_str()).unwrap_or_default();
    match name {
        "search_google" => search_google(http, query).await,
        "search_wikipedia" => search_wikipedia(http, query).await,
        _ => format!("Error: Tool {} not found.", name),
    }
}

/// Search the web via Serper.dev. Requires `SERPER_API_KEY`.
async fn search_google(http: &Client, query: &str) -> String {
    let api_key = match std::env::var("SERPER_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            warn!("Serper API key not found, skipping search");
            return "Error: Serper Search is not configured. Please set SERPER_API_KEY.".to_string();
        }
    };

    let response = match http
        .post(SERPER_API_URL)
        .header("X-API-KEY", api_key)
        .json(&json!({ "q": query }))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Serper search request failed");
            return "An error occurred while performing search.".to_string();
        }
    };

    if !response.status().is_success() {
        return format!("Error performing Search: {}", response.status());
    }

    let data: Value = match response.json().await {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "Failed to parse Serper response");
            return "An error occurred while performing search.".to_string();
        }
    };

    let organic = data.get("organic").and_then(|o| o.as_array()).cloned().unwrap_or_default();
    if organic.is_empty() {
        return "No search results found.".to_string();
    }

    let results = organic
        .iter()
        .take(5)
        .map(|item| {
            format!(
                "Title: {}\nLink: {}\nSnippet: {}\n",
                item.get("title").and_then(|v| v.as_str()).unwrap_or_default(),
                item.get("link").and_then(|v| v.as_str()).unwrap_or_default(),
                item.get("snippet").and_then(|v| v.as_str()).unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    // Answer box / knowledge graph lead-ins when present.
    let mut extra = String::new();
    if let Some(answer_box) = data.get("answerBox") {
        let answer = answer_box
            .get("answer")
            .or_else(|| answer_box.get("snippet"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        extra.push_str(&format!("Answer: {}\n\n", answer));
    }
    if let Some(kg) = data.get("knowledgeGraph") {
        extra.push_str(&format!(
            "Knowledge Graph: {} - {}\n\n",
            kg.get("title").and_then(|v| v.as_str()).unwrap_or_default(),
            kg.get("description").and_then(|v| v.as_str()).unwrap_or_default(),
        ));
    }

    format!("Search Results for \"{}\":\n\n{}{}", query, extra, results)
}

/// Search Wikipedia via the MediaWiki API. No key required.
async fn search_wikipedia(http: &Client, query: &str) -> String {
    let search_url = format!(
        "{}?action=query&list=search&srsearch={}&format=json&origin=*",
        WIKIPEDIA_API_URL,
        urlencoding::encode(query)
    );

    let search_data: Value = match http.get(&search_url).send().await {
        Ok(r) if r.status().is_success() => match r.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Failed to parse Wikipedia search response");
                return "An error occurred while searching Wikipedia.".to_string();
            }
        },
        Ok(r) => return format!("Error searching Wikipedia: {}", r.status()),
        Err(e) => {
            warn!(error = %e, "Wikipedia search request failed");
            return "An error occurred while searching Wikipedia.".to_string();
        }
    };

    let results = search_data
        .pointer("/query/search")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();
    if results.is_empty() {
        return "No Wikipedia articles found.".to_string();
    }

    // Pull intro extracts for the top results; fall back to search snippets.
    let page_ids = results
        .iter()
        .take(3)
        .filter_map(|r| r.get("pageid").and_then(|p| p.as_i64()))
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("|");

    let extracts_url = format!(
        "{}?action=query&prop=extracts&pageids={}&exintro=true&explaintext=true&format=json&origin=*",
        WIKIPEDIA_API_URL, page_ids
    );

    let extracts: Option<Value> = match http.get(&extracts_url).send().await {
        Ok(r) if r.status().is_success() => r.json().await.ok(),
        _ => None,
    };

    let Some(extracts) = extracts else {
        let snippets = results
            .iter()
            .take(3)
            .map(|r| {
                let snippet = r.get("snippet").and_then(|s| s.as_str()).unwrap_or_default();
                let snippet = regex::Regex::new(r"<[^>]+>").unwrap().replace_all(snippet, "");
                format!(
                    "Title: {}\nSnippet: {}",
                    r.get("title").and_then(|t| t.as_str()).unwrap_or_default(),
                    snippet
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        return format!("Wikipedia Search Results (Snippets):\n{}", snippets);
    };

    let pages = extracts
        .pointer("/query/pages")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let formatted = pages
        .values()
        .map(|page| {
            format!(
                "Title: {}\nSummary: {}\nLink: https://en.wikipedia.org/?curid={}",
                page.get("title").and_then(|t| t.as_str()).unwrap_or_default(),
                page.get("extract").and_then(|e| e.as_str()).unwrap_or_default(),
                page.get("pageid").and_then(|p| p.as_i64()).unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!("Wikipedia Search Results for \"{}\":\n\n{}", query, formatted)
}
