//! LLM-backed classification (C3, spec §4.3). Three prompts: account type,
//! profile category, and content category; each goes through the JSON
//! recovery chain and a deterministic fallback, so a caller always gets a
//! typed classification and the categoriser itself never raises.

pub mod json_recovery;
pub mod prompts;

use serde::Deserialize;

use crate::fetchers::LlmChatFetcher;
use crate::models::AccountType;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
    pub confidence: f64,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            primary: "Uncategorized".to_string(),
            secondary: "Uncategorized".to_string(),
            tertiary: "Uncategorized".to_string(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentClassification {
    pub classification: Classification,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    primary: String,
    #[serde(default)]
    secondary: String,
    #[serde(default)]
    tertiary: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Static `(primary, secondary) -> tertiary` fallback, used when the LLM
/// leaves `tertiary` empty (spec §4.3 tertiary backfill).
const TERTIARY_BACKFILL: &[((&str, &str), &str)] = &[
    (("Health & Wellness", "Fitness"), "General Fitness"),
    (("Health & Wellness", "Mental Health"), "Mindfulness"),
    (("Health & Wellness", "Nutrition"), "Healthy Eating"),
    (("Business", "Entrepreneurship"), "Startups"),
    (("Business", "Marketing"), "Social Media Marketing"),
    (("Entertainment", "Comedy"), "Sketch Comedy"),
    (("Entertainment", "Music"), "Music Performance"),
    (("Lifestyle", "Fashion"), "Streetwear"),
    (("Lifestyle", "Travel"), "Travel Vlogging"),
    (("Education", "Personal Development"), "Self Improvement"),
];

fn backfill_tertiary(primary: &str, secondary: &str) -> String {
    TERTIARY_BACKFILL
        .iter()
        .find(|((p, s), _)| *p == primary && *s == secondary)
        .map(|(_, tertiary)| tertiary.to_string())
        .unwrap_or_else(|| "General".to_string())
}

pub async fn classify_account_type(llm: &dyn LlmChatFetcher, username: &str, bio: &str, posts_count: i64) -> AccountType {
    let (system, user) = prompts::account_type_prompt(username, bio, posts_count);
    match llm.complete(&system, &user).await {
        Ok(raw) => AccountType::normalize(raw.trim()),
        Err(_) => AccountType::Personal,
    }
}

pub async fn classify_profile(
    llm: &dyn LlmChatFetcher,
    username: &str,
    bio: &str,
    recent_captions: &[String],
) -> Classification {
    let (system, user) = prompts::profile_category_prompt(username, bio, recent_captions);
    classify_with_recovery(llm, &system, &user).await.classification
}

pub async fn classify_content(
    llm: &dyn LlmChatFetcher,
    description: &str,
    owner_category: &str,
) -> ContentClassification {
    let (system, user) = prompts::content_category_prompt(description, owner_category);
    let mut result = classify_with_recovery(llm, &system, &user).await;
    result.keywords.truncate(4);
    result
}

async fn classify_with_recovery(llm: &dyn LlmChatFetcher, system: &str, user: &str) -> ContentClassification {
    let raw = match llm.complete(system, user).await {
        Ok(raw) => raw,
        Err(_) => return ContentClassification::default(),
    };

    let Some(value) = json_recovery::recover_json(&raw) else {
        return ContentClassification::default();
    };
    let Ok(parsed) = serde_json::from_value::<RawClassification>(value) else {
        return ContentClassification::default();
    };

    let tertiary = if parsed.tertiary.trim().is_empty() {
        backfill_tertiary(&parsed.primary, &parsed.secondary)
    } else {
        parsed.tertiary
    };

    ContentClassification {
        classification: Classification {
            primary: if parsed.primary.is_empty() { "Uncategorized".to_string() } else { parsed.primary },
            secondary: if parsed.secondary.is_empty() { "Uncategorized".to_string() } else { parsed.secondary },
            tertiary,
            confidence: parsed.confidence,
        },
        keywords: parsed.keywords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::llm_chat::FakeLlmChatFetcher;

    #[tokio::test]
    async fn classifies_account_type_from_plain_label() {
        let llm = FakeLlmChatFetcher::new(vec!["Influencer".to_string()]);
        let result = classify_account_type(&llm, "u", "bio", 10).await;
        assert_eq!(result, AccountType::Influencer);
    }

    #[tokio::test]
    async fn account_type_falls_back_to_personal_on_error() {
        let llm = FakeLlmChatFetcher::new(vec![]);
        let result = classify_account_type(&llm, "u", "bio", 10).await;
        assert_eq!(result, AccountType::Personal);
    }

    #[tokio::test]
    async fn classifies_content_with_keywords_capped_at_four() {
        let llm = FakeLlmChatFetcher::new(vec![
            r#"{"primary": "Health & Wellness", "secondary": "Fitness", "tertiary": "", "confidence": 0.9, "keywords": ["a","b","c","d","e"]}"#.to_string(),
        ]);
        let result = classify_content(&llm, "desc", "owner cat").await;
        assert_eq!(result.classification.primary, "Health & Wellness");
        assert_eq!(result.classification.tertiary, "General Fitness");
        assert_eq!(result.keywords.len(), 4);
    }

    #[tokio::test]
    async fn falls_back_to_default_classification_on_malformed_output() {
        let llm = FakeLlmChatFetcher::new(vec!["complete garbage, no json here".to_string()]);
        let result = classify_profile(&llm, "u", "bio", &[]).await;
        assert_eq!(result, Classification::default());
    }

    #[test]
    fn unmatched_primary_secondary_backfills_to_general() {
        assert_eq!(backfill_tertiary("Nonexistent", "Nothing"), "General");
    }
}
