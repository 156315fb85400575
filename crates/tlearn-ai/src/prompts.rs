//! Prompt templates for the multi-pass summarization pipeline.
//!
//! Pure functions: deterministic text given inputs, no I/O. All prompts
//! explicitly instruct the model to output only the final result, since some
//! backends otherwise leak reasoning preambles the sanitizer then has to
//! catch.

use tlearn_models::Category;

const NO_THINKING: &str = "CRITICAL: Output ONLY the final result. Do NOT include your reasoning process, analysis steps, thinking, self-corrections, or any preamble. Start directly with the content.";

/// Pass 1: structural analysis of the transcript, returned as JSON with a
/// category label.
pub fn structural_analysis_prompt(transcript: &str) -> String {
    format!(
        r#"You are an expert content analyst. Analyze this video transcript and provide a structural breakdown.

{no_thinking}

TRANSCRIPT:
{transcript}

Provide your analysis as valid JSON with this structure:
{{
  "title_suggestion": "A concise title for this video's content",
  "category": "one of: {categories}",
  "difficulty": "beginner | intermediate | advanced",
  "duration_estimate": "estimated video duration",
  "sections": [
    {{
      "title": "Section title",
      "start_time": "approximate timestamp",
      "start_seconds": 0,
      "topics": ["topic1", "topic2"],
      "summary": "Brief 1-2 sentence summary of this section"
    }}
  ],
  "key_topics": ["Main topic 1", "Main topic 2"],
  "speakers": ["Speaker names if identifiable"]
}}

Respond ONLY with valid JSON, no markdown code fences, no explanation."#,
        no_thinking = NO_THINKING,
        categories = Category::prompt_list(),
        transcript = transcript,
    )
}

/// Lightweight category classification, used when pass 1 output fails to
/// parse as JSON.
pub fn category_detection_prompt(transcript_sample: &str) -> String {
    format!(
        r#"Classify this video transcript into exactly one category. Respond with ONLY the category name, nothing else.

Categories: {categories}

TRANSCRIPT SAMPLE:
{transcript_sample}

Respond with ONLY the category name, nothing else."#,
        categories = Category::prompt_list(),
        transcript_sample = transcript_sample,
    )
}

/// Pass 2: the category-adaptive deep summary document.
pub fn deep_summary_prompt(transcript: &str, structural_analysis: &str, category: Category) -> String {
    format!(
        r#"You are an expert educational content writer. Create a deep, comprehensive learning document from this video transcript.

{no_thinking}

TRANSCRIPT:
{transcript}

STRUCTURAL ANALYSIS:
{structural_analysis}

VIDEO CATEGORY: {category}

Write a rich, highly readable markdown document that serves as a **complete, self-contained lesson**. The reader should fully understand the topic without watching the video. Use bullet points with full, comprehensive sentences — not fragments. Use emojis as visual markers for sections.

FORMAT:
# 🎬 [Video Title]

> [Brief summary in one sentence]

## 🔑 Key Takeaways
- ✅ [Full sentence summarizing a key point with enough context to stand alone.]
- ✅ [Another complete, informative takeaway.]
...

## 📝 Detailed Summary
### 📌 [Section Title] [timestamp](yt:SECONDS)
- **[Key concept]** — Full sentence explaining the concept with specifics, numbers, or examples from the video.
- 💬 Notable quote or paraphrase from the speaker, with context for why it matters.
- 📊 Specific data point, statistic, research finding, or concrete example mentioned.
- 💡 Additional background context or broader implication that helps the reader understand the topic more deeply (weave this naturally where relevant — do not save it for a separate section).

{category_instructions}

TIMESTAMP RULES:
1. Use this exact format for EVERY time reference: [M:SS](yt:SECONDS)
   - Example: [2:15](yt:135)
   - Ensure the seconds calculation is correct.

WRITING RULES:
- 📋 **Bullet points with full sentences** — every bullet should be a complete, informative sentence, not a fragment.
- 🎯 **Be specific** — include actual numbers, names, studies, and examples from the video.
- 🏷️ Use **bold** for key terms on first mention.
- 💻 Use `code` formatting for technical terms, tools, or specific values.
- 🎨 Use emojis as section/bullet markers to improve scannability (📌 🔑 💡 ⚡ 🎯 📊 🔗 ⚠️ etc.).
- 📖 This should be a **full lesson** — comprehensive enough that the reader learns the topic without watching the video.
- 🌍 Where it helps understanding, enrich the content with relevant background knowledge, historical context, or connections to related concepts. Weave this directly into the relevant sections — do not create a separate section for it."#,
        no_thinking = NO_THINKING,
        transcript = transcript,
        structural_analysis = structural_analysis,
        category = category.as_str(),
        category_instructions = category_instructions(category),
    )
}

/// Category-specific sections for the deep summary pass.
fn category_instructions(category: Category) -> &'static str {
    match category {
        Category::ProgrammingTutorial => {
            r#"
### Code Examples
(Include the actual code discussed or demonstrated in the video. Use proper syntax highlighting with language tags. Add brief comments explaining key lines.)

### Technologies & Tools
(List all frameworks, libraries, languages, and tools mentioned with brief context on how they're used)"#
        }
        Category::TechTalk => {
            r#"
### Architecture & Design
(If the video discusses system architecture, describe the components and their relationships.)

### Technical Decisions
(Document key technical decisions, trade-offs, and their rationale)"#
        }
        Category::ScienceEducation => {
            r#"
### Key Concepts
(Explain the main scientific or educational concepts in clear language, as the video presents them)

### Data & Evidence
(Summarize any studies, statistics, experiments, or evidence cited in the video)"#
        }
        Category::AiMl => {
            r#"
### Models & Techniques
(Describe the AI/ML models, algorithms, or techniques discussed. Explain how they work at a conceptual level.)

### Benchmarks & Results
(Summarize any performance metrics, benchmarks, or comparisons mentioned)

### Practical Applications
(Note real-world use cases or applications discussed)"#
        }
        Category::History => {
            r#"
### Historical Context
(Set the scene — time period, geography, and key figures involved)

### Timeline of Events
(Chronological breakdown of the key events discussed)

### Significance & Legacy
(Explain the lasting impact or relevance of the historical events)"#
        }
        Category::Psychology => {
            r#"
### Key Theories & Concepts
(Explain the psychological theories, models, or frameworks discussed)

### Research & Studies
(Summarize any studies, experiments, or data cited)

### Practical Takeaways
(Actionable insights for understanding behavior or improving well-being)"#
        }
        Category::Philosophy => {
            r#"
### Core Arguments
(Outline the main philosophical arguments and their logical structure)

### Thinkers & Schools
(Reference the philosophers, traditions, or schools of thought discussed)

### Questions Raised
(Key open questions or thought experiments posed)"#
        }
        Category::HealthMedicine => {
            r#"
### Medical/Health Concepts
(Explain the health topics, conditions, or treatments discussed)

### Evidence & Research
(Summarize clinical studies, data, or expert opinions cited)

### Practical Advice
(Actionable health recommendations mentioned — note that this is informational, not medical advice)"#
        }
        Category::BusinessFinance => {
            r#"
### Key Business Concepts
(Explain the business strategies, financial concepts, or market dynamics discussed)

### Data & Metrics
(Summarize any financial data, market stats, or performance indicators mentioned)

### Actionable Insights
(Strategic takeaways or investment considerations discussed)"#
        }
        Category::NewsOpinion => {
            r#"
### Arguments & Analysis
(Outline the main arguments presented. Clearly distinguish between stated facts and opinions.)

### Perspectives
(Note different viewpoints discussed, including counterarguments if any)"#
        }
        Category::ProductReview => {
            r#"
### Pros & Cons
| ✅ Pros | ❌ Cons |
|---------|--------|
| ... | ... |

### Verdict
(Summarize the reviewer's overall assessment and recommendation)"#
        }
        Category::InterviewPodcast => {
            r#"
### Key Discussion Points
(Summarize the main topics discussed, attributing positions to specific speakers)

### Speaker Insights
(Notable perspectives or revelations from each speaker)"#
        }
        Category::Education => {
            r#"
### Learning Objectives
(What the viewer should understand after watching this video)

### Core Concepts Explained
(Clear explanations of the educational material covered)

### Examples & Exercises
(Any worked examples, practice problems, or demonstrations shown)"#
        }
        Category::MathEngineering => {
            r#"
### Formulas & Equations
(Key mathematical formulas or engineering equations discussed, formatted in code blocks)

### Problem-Solving Approach
(Step-by-step methodology or approach demonstrated)

### Applications
(Real-world engineering or mathematical applications discussed)"#
        }
        Category::MusicArts => {
            r#"
### Artistic Analysis
(Discuss the creative techniques, styles, or compositions covered)

### Artists & Works
(Reference specific artists, pieces, or performances discussed)

### Creative Insights
(Unique perspectives on the creative process or artistic interpretation)"#
        }
        Category::DiyHowto => {
            r#"
### Materials & Tools Needed
(List all required materials, tools, and resources mentioned)

### Step-by-Step Instructions
(Numbered steps following the process demonstrated in the video)

### Tips & Common Mistakes
(Helpful advice and pitfalls to avoid mentioned by the creator)"#
        }
        Category::TravelCulture => {
            r#"
### Destinations & Highlights
(Key locations, landmarks, or cultural sites covered)

### Cultural Context
(Important cultural context, customs, or local knowledge shared)

### Practical Tips
(Travel advice, recommendations, or logistics mentioned)"#
        }
        Category::Gaming => {
            r#"
### Gameplay & Mechanics
(Describe the game mechanics, strategies, or gameplay elements discussed)

### Analysis & Opinion
(Summarize the creator's analysis, ratings, or opinions on the game)

### Tips & Strategies
(Any tips, tricks, or strategies shared for players)"#
        }
        Category::General => {
            r#"
### Additional Insights
(Any additional context, connections, or implications worth noting)"#
        }
    }
}

/// Pass 3: translate the final summary, preserving markdown structure and
/// timestamp links.
pub fn translation_prompt(summary: &str, target_language: &str) -> String {
    let language_name = match target_language {
        "tr" => "Turkish (Türkçe)",
        other => other,
    };

    format!(
        r#"You are an expert translator. Translate the following video summary into {language_name}.

{no_thinking}

ORIGINAL SUMMARY:
{summary}

RULES:
1. Translate the prose, headings, and bullet points naturally and accurately.
2. PRESERVE all markdown formatting exactly (headings, bold, lists, code blocks).
3. PRESERVE all timestamps exactly: [M:SS](yt:SECONDS). Do NOT translate or modify the link part.
4. PRESERVE any mermaid code blocks exactly.
5. PRESERVE any code snippets exactly.
6. PRESERVE the token usage footer if present.
7. Use professional, clear language suitable for an educational summary.

Respond with ONLY the translated markdown, no preamble."#,
        language_name = language_name,
        no_thinking = NO_THINKING,
        summary = summary,
    )
}

/// Suggest follow-up questions from a completed summary. Expected to return
/// a JSON array of strings.
pub fn suggested_questions_prompt(summary_sample: &str) -> String {
    format!(
        "Based on this video summary, suggest 4 interesting questions a viewer might ask.\n\
         Return ONLY a JSON array of strings, no other text.\n\
         \n\
         SUMMARY:\n\
         {}",
        summary_sample
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_prompt_embeds_transcript_and_categories() {
        let prompt = structural_analysis_prompt("[0:00] hello");
        assert!(prompt.contains("[0:00] hello"));
        assert!(prompt.contains("programming_tutorial"));
        assert!(prompt.contains("general"));
        assert!(prompt.contains("valid JSON"));
    }

    #[test]
    fn test_deep_summary_prompt_selects_category_sections() {
        let programming =
            deep_summary_prompt("t", "{}", Category::ProgrammingTutorial);
        assert!(programming.contains("### Code Examples"));

        let history = deep_summary_prompt("t", "{}", Category::History);
        assert!(history.contains("### Timeline of Events"));
        assert!(!history.contains("### Code Examples"));

        let general = deep_summary_prompt("t", "{}", Category::General);
        assert!(general.contains("### Additional Insights"));
    }

    #[test]
    fn test_translation_prompt_names_turkish() {
        let prompt = translation_prompt("# Doc", "tr");
        assert!(prompt.contains("Turkish (Türkçe)"));

        let other = translation_prompt("# Doc", "de");
        assert!(other.contains("into de."));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        assert_eq!(
            deep_summary_prompt("a", "b", Category::Gaming),
            deep_summary_prompt("a", "b", Category::Gaming)
        );
    }
}
