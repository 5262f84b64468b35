use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// `accountType` — normalised per spec §4.1: numeric 1/2/3 map to the three
/// named variants, string variants fold case-insensitively, unknown → Personal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Personal,
    BusinessPage,
    Influencer,
    /// Categoriser-only classification (spec §4.3); not stored as a
    /// `PrimaryProfile.accountType` value, folded to `Personal` on write.
    ThemePage,
}

impl AccountType {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim() {
            "1" => Self::Personal,
            "2" => Self::BusinessPage,
            "3" => Self::Influencer,
            other => match other.to_lowercase().as_str() {
                "business page" | "business_page" | "business" => Self::BusinessPage,
                "influencer" => Self::Influencer,
                "theme page" | "theme_page" | "theme" => Self::ThemePage,
                _ => Self::Personal,
            },
        }
    }

    /// Fold to one of the three values the `PrimaryProfile` column accepts.
    pub fn for_storage(self) -> Self {
        match self {
            Self::ThemePage => Self::Personal,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::BusinessPage => "Business Page",
            Self::Influencer => "Influencer",
            Self::ThemePage => "Theme Page",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct AggMetrics {
    pub total_reels: i64,
    pub median_views: f64,
    pub mean_views: f64,
    pub std_views: f64,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PrimaryProfile {
    /// Primary key; comparisons/lookups are case-insensitive (stored lowercased).
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub followers: i64,
    pub posts_count: i64,
    pub is_verified: bool,
    #[sqlx(try_from = "String")]
    pub account_type: AccountTypeColumn,
    pub image_key: Option<String>,
    pub primary_category: Option<String>,
    pub secondary_category: Option<String>,
    pub tertiary_category: Option<String>,

    pub total_reels: i64,
    pub median_views: f64,
    pub mean_views: f64,
    pub std_views: f64,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,

    /// Usernames of up to 20 algorithmically-similar profiles.
    pub similar: Vec<String>,

    pub last_full_scrape: Option<DateTime<Utc>>,
    pub analysis_timestamp: Option<DateTime<Utc>>,
}

impl PrimaryProfile {
    pub fn agg_metrics(&self) -> AggMetrics {
        AggMetrics {
            total_reels: self.total_reels,
            median_views: self.median_views,
            mean_views: self.mean_views,
            std_views: self.std_views,
            total_views: self.total_views,
            total_likes: self.total_likes,
            total_comments: self.total_comments,
        }
    }
}

/// Newtype so `sqlx::FromRow`'s `try_from = "String"` can hand the raw
/// column text to [`AccountType::normalize`] without fighting sqlx's enum
/// support (the column is a plain text column, not a Postgres enum type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AccountTypeColumn(pub AccountType);

impl TryFrom<String> for AccountTypeColumn {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(AccountType::normalize(&value)))
    }
}

impl From<AccountType> for AccountTypeColumn {
    fn from(value: AccountType) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_numeric_codes() {
        assert_eq!(AccountType::normalize("1"), AccountType::Personal);
        assert_eq!(AccountType::normalize("2"), AccountType::BusinessPage);
        assert_eq!(AccountType::normalize("3"), AccountType::Influencer);
    }

    #[test]
    fn normalizes_string_variants_case_insensitively() {
        assert_eq!(AccountType::normalize("INFLUENCER"), AccountType::Influencer);
        assert_eq!(AccountType::normalize("business_page"), AccountType::BusinessPage);
    }

    #[test]
    fn unknown_folds_to_personal() {
        assert_eq!(AccountType::normalize("whatever"), AccountType::Personal);
    }

    #[test]
    fn theme_page_folds_to_personal_for_storage() {
        assert_eq!(AccountType::ThemePage.for_storage(), AccountType::Personal);
    }
}
