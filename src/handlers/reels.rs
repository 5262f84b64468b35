//! `GET /api/reels` (spec §6).

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::Content;
use crate::store::content::{ContentFilter, ContentSort};
use crate::utils::{ApiResult, Envelope};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 24;
const MAX_LIMIT: i64 = 100;

/// Raw query-string shape for `/api/reels` and `/api/posts`; `#[serde(default)]`
/// on every field so an empty query string is a valid, unfiltered request.
#[derive(Debug, Deserialize, Default)]
pub struct ContentQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub owner_username: Option<String>,
    #[serde(default)]
    pub primary_categories: Option<String>,
    #[serde(default)]
    pub secondary_categories: Option<String>,
    #[serde(default)]
    pub tertiary_categories: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub content_styles: Option<String>,
    #[serde(default)]
    pub excluded_usernames: Option<String>,
    #[serde(default)]
    pub min_followers: Option<i64>,
    #[serde(default)]
    pub max_followers: Option<i64>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub random_order: Option<bool>,
    /// Accepted for compatibility with the query surface; the store has
    /// no durable per-session state to key off of (see `reset_session`).
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub account_types: Option<String>,
    #[serde(default)]
    pub content_types: Option<String>,
    /// Accepted but not filterable: `contents` rows carry no language
    /// column besides `transcript_language`, which describes the
    /// transcript, not the post itself.
    #[serde(default)]
    pub languages: Option<String>,
    #[serde(default)]
    pub min_outlier_score: Option<f64>,
    #[serde(default)]
    pub max_outlier_score: Option<f64>,
    #[serde(default)]
    pub min_views: Option<i64>,
    #[serde(default)]
    pub max_views: Option<i64>,
    #[serde(default)]
    pub min_likes: Option<i64>,
    #[serde(default)]
    pub max_likes: Option<i64>,
    #[serde(default)]
    pub min_comments: Option<i64>,
    #[serde(default)]
    pub max_comments: Option<i64>,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

fn split_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn parse_sort(raw: Option<&str>) -> ContentSort {
    match raw.unwrap_or("popular") {
        "views" => ContentSort::Views,
        "likes" | "account_engagement" | "content_engagement" => ContentSort::Likes,
        "comments" => ContentSort::Comments,
        "recent" => ContentSort::Recent,
        "oldest" => ContentSort::Oldest,
        _ => ContentSort::Popular,
    }
}

fn parse_date_range(raw: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    let days = match raw? {
        "day" => 1,
        "week" => 7,
        "month" => 30,
        "year" => 365,
        _ => return None,
    };
    Some(chrono::Utc::now() - chrono::Duration::days(days))
}

/// Shared by `/api/reels` and `/api/posts`; `forced_kind` pins `content_kind`
/// for the posts variant.
pub fn build_filter(query: ContentQuery, forced_kind: Option<&str>) -> ContentFilter {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    ContentFilter {
        search: query.search,
        owner_username: query.owner_username,
        content_kind: forced_kind.map(str::to_string),
        primary_categories: split_csv(&query.primary_categories),
        secondary_categories: split_csv(&query.secondary_categories),
        tertiary_categories: split_csv(&query.tertiary_categories),
        keywords: split_csv(&query.keywords),
        min_outlier_score: query.min_outlier_score,
        max_outlier_score: query.max_outlier_score,
        min_views: query.min_views,
        max_views: query.max_views,
        min_likes: query.min_likes,
        max_likes: query.max_likes,
        min_comments: query.min_comments,
        max_comments: query.max_comments,
        posted_after: parse_date_range(query.date_range.as_deref()),
        content_styles: split_csv(&query.content_styles),
        excluded_usernames: split_csv(&query.excluded_usernames),
        min_followers: query.min_followers,
        max_followers: query.max_followers,
        is_verified: query.is_verified,
        random_order: query.random_order.unwrap_or(false),
        sort_by: parse_sort(query.sort_by.as_deref()),
        limit,
        offset: query.offset.unwrap_or(0).max(0),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContentListResponse {
    pub reels: Vec<Content>,
    pub is_last_page: bool,
}

pub async fn list_reels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = build_filter(query, Some("reel"));
    let (reels, is_last_page) = state.store.search_content(&filter).await?;
    Ok(Envelope::new(ContentListResponse { reels, is_last_page }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_to_spec_bounds() {
        let filter = build_filter(ContentQuery { limit: Some(500), ..Default::default() }, None);
        assert_eq!(filter.limit, MAX_LIMIT);
        let filter = build_filter(ContentQuery { limit: Some(0), ..Default::default() }, None);
        assert_eq!(filter.limit, 1);
    }

    #[test]
    fn unset_limit_falls_back_to_default() {
        let filter = build_filter(ContentQuery::default(), None);
        assert_eq!(filter.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn csv_fields_split_and_trim() {
        let filter = build_filter(
            ContentQuery { keywords: Some("a, b ,c".to_string()), ..Default::default() },
            None,
        );
        assert_eq!(filter.keywords, vec!["a", "b", "c"]);
    }
}
