use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::primary_profile::AccountTypeColumn;

/// A discovered profile referenced by a primary but not yet fully scraped
/// (spec §3, GLOSSARY). May later be promoted to a `PrimaryProfile` row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SecondaryProfile {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub media_count: i64,
    pub image_key: Option<String>,
    pub is_verified: bool,
    #[sqlx(try_from = "String")]
    pub account_type: AccountTypeColumn,
    pub primary_category: Option<String>,
    pub secondary_category: Option<String>,
    pub tertiary_category: Option<String>,
    pub discovered_by: i64,
    pub similarity_rank: i32,
}
