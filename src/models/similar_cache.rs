use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One row per (primary, similar) pair; unique on the pair. TTL 24h,
/// enforced by callers comparing `created_at` against the configured window
/// (spec §3, `/api/profile/{username}/similar-fast`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SimilarProfilesCache {
    pub primary_username: String,
    pub similar_username: String,
    pub name: Option<String>,
    pub image_key: Option<String>,
    pub rank: i32,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub image_downloaded: bool,
}

impl SimilarProfilesCache {
    pub fn is_stale(&self, ttl_hours: i64) -> bool {
        Utc::now() - self.created_at > chrono::Duration::hours(ttl_hours)
    }
}
