//! Video content categories.
//!
//! Pass 1 classifies each video into one of a closed set of categories; the
//! deep-summary prompt picks category-specific sections from this label.
//! Anything unrecognized collapses to `General`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of content categories plus the `general` fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ProgrammingTutorial,
    TechTalk,
    ScienceEducation,
    AiMl,
    History,
    Psychology,
    Philosophy,
    HealthMedicine,
    BusinessFinance,
    NewsOpinion,
    ProductReview,
    InterviewPodcast,
    Education,
    MathEngineering,
    MusicArts,
    DiyHowto,
    TravelCulture,
    Gaming,
    #[default]
    General,
}

/// Every category in prompt order, `general` last.
pub const ALL_CATEGORIES: [Category; 19] = [
    Category::ProgrammingTutorial,
    Category::TechTalk,
    Category::ScienceEducation,
    Category::AiMl,
    Category::History,
    Category::Psychology,
    Category::Philosophy,
    Category::HealthMedicine,
    Category::BusinessFinance,
    Category::NewsOpinion,
    Category::ProductReview,
    Category::InterviewPodcast,
    Category::Education,
    Category::MathEngineering,
    Category::MusicArts,
    Category::DiyHowto,
    Category::TravelCulture,
    Category::Gaming,
    Category::General,
];

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ProgrammingTutorial => "programming_tutorial",
            Category::TechTalk => "tech_talk",
            Category::ScienceEducation => "science_education",
            Category::AiMl => "ai_ml",
            Category::History => "history",
            Category::Psychology => "psychology",
            Category::Philosophy => "philosophy",
            Category::HealthMedicine => "health_medicine",
            Category::BusinessFinance => "business_finance",
            Category::NewsOpinion => "news_opinion",
            Category::ProductReview => "product_review",
            Category::InterviewPodcast => "interview_podcast",
            Category::Education => "education",
            Category::MathEngineering => "math_engineering",
            Category::MusicArts => "music_arts",
            Category::DiyHowto => "diy_howto",
            Category::TravelCulture => "travel_culture",
            Category::Gaming => "gaming",
            Category::General => "general",
        }
    }

    /// Normalize and validate a model-produced label.
    ///
    /// Trims and lowercases before matching; anything outside the closed set
    /// falls back to `General`.
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        ALL_CATEGORIES
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .unwrap_or(Category::General)
    }

    /// Comma-separated label list used by classification prompts.
    pub fn prompt_list() -> String {
        ALL_CATEGORIES
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_categories() {
        assert_eq!(Category::parse("programming_tutorial"), Category::ProgrammingTutorial);
        assert_eq!(Category::parse("ai_ml"), Category::AiMl);
        assert_eq!(Category::parse("gaming"), Category::Gaming);
    }

    #[test]
    fn test_parse_normalizes_whitespace_and_case() {
        assert_eq!(Category::parse("  Tech_Talk \n"), Category::TechTalk);
        assert_eq!(Category::parse("HISTORY"), Category::History);
    }

    #[test]
    fn test_parse_unknown_falls_back_to_general() {
        assert_eq!(Category::parse("cooking"), Category::General);
        assert_eq!(Category::parse(""), Category::General);
        assert_eq!(Category::parse("tech talk"), Category::General);
    }

    #[test]
    fn test_roundtrip_all() {
        for category in ALL_CATEGORIES {
            assert_eq!(Category::parse(category.as_str()), category);
        }
    }
}
