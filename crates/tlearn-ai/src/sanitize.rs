//! Reasoning-leak cleanup for raw model output.
//!
//! Some backends leak their chain of thought into the answer: explicit
//! `<think>` blocks, a step-by-step preamble before the real content, or the
//! whole answer wrapped in a code fence. This is a best-effort heuristic text
//! transform, not a parser. The exact trigger conditions:
//!
//! - any paired or unpaired `<think>`/`</think>` block is removed
//! - a preamble before the first markdown heading is removed only when at
//!   least one of its lines matches a reasoning marker (numbered action
//!   verbs, first-person planning language, or `Label:` scaffolding)
//! - a code fence wrapping the entire output is unwrapped

use regex::Regex;

/// Strip thinking/reasoning leakage from model output.
///
/// Deterministic and idempotent: output with no reasoning markers before its
/// first heading passes through unchanged.
pub fn strip_reasoning(text: &str) -> String {
    let think_block = Regex::new(r"(?is)<think>.*?</think>").unwrap();
    let orphan_close = Regex::new(r"(?i)</think>").unwrap();

    let mut result = think_block.replace_all(text, "").to_string();
    result = orphan_close.replace_all(&result, "").to_string();

    // Reasoning preamble before the first markdown heading.
    let heading = Regex::new(r"(?m)^#{1,6}\s").unwrap();
    if let Some(m) = heading.find(&result) {
        if m.start() > 0 && preamble_is_reasoning(&result[..m.start()]) {
            result = result[m.start()..].to_string();
        }
    }

    // Code fence wrapping the entire output.
    let open_fence = Regex::new(r"(?i)\A```(?:markdown)?[ \t]*\n").unwrap();
    result = open_fence.replace(&result, "").to_string();
    let close_fence = Regex::new(r"\n```\s*\z").unwrap();
    result = close_fence.replace(&result, "").to_string();

    result.trim().to_string()
}

fn preamble_is_reasoning(preamble: &str) -> bool {
    let markers = [
        Regex::new(
            r"(?i)^\d+\.\s+(analyze|review|draft|construct|refin|self-correct|format|check|let'?s|generat)",
        )
        .unwrap(),
        Regex::new(r"(?i)^-\s+(analyze|review|draft|construct|refin|self-correct|format|check)")
            .unwrap(),
        Regex::new(
            r"(?i)^(analyze|review|draft|construct|refin|self-correct|format|check|let me|i need to|i will|first,|next,|finally,|now,)",
        )
        .unwrap(),
        Regex::new(r"(?i)^(input|output|role|goal|action|constraint|result)\s*:").unwrap(),
    ];

    preamble
        .trim()
        .lines()
        .any(|line| markers.iter().any(|m| m.is_match(line.trim())))
}
