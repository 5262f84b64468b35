//! `/api/profile/*` and `/api/reset-session` (spec §6).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::reels::ContentListResponse;
use crate::models::{Priority, QueueItem, QueueStatus, SimilarProfilesCache};
use crate::store::content::ContentFilter;
use crate::utils::{ApiError, ApiResult, Envelope};
use crate::AppState;

const SIMILAR_CACHE_TTL_HOURS: i64 = 24;

pub async fn get_profile(State(state): State<Arc<AppState>>, Path(username): Path<String>) -> ApiResult<impl IntoResponse> {
    let profile = state
        .store
        .get_primary(&username)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("profile '{username}' not found")))?;
    Ok(Envelope::new(profile))
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileReelsQuery {
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn profile_reels(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<ProfileReelsQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = ContentFilter {
        owner_username: Some(username),
        sort_by: crate::handlers::reels::ContentQuery {
            sort_by: query.sort_by,
            limit: query.limit,
            offset: query.offset,
            ..Default::default()
        }
        .sort_by
        .as_deref()
        .map(parse_sort_standalone)
        .unwrap_or_default(),
        limit: query.limit.unwrap_or(24).clamp(1, 100),
        offset: query.offset.unwrap_or(0).max(0),
        ..Default::default()
    };
    let (reels, is_last_page) = state.store.search_content(&filter).await?;
    Ok(Envelope::new(ContentListResponse { reels, is_last_page }))
}

fn parse_sort_standalone(raw: &str) -> crate::store::content::ContentSort {
    use crate::store::content::ContentSort;
    match raw {
        "views" => ContentSort::Views,
        "likes" => ContentSort::Likes,
        "comments" => ContentSort::Comments,
        "recent" => ContentSort::Recent,
        "oldest" => ContentSort::Oldest,
        _ => ContentSort::Popular,
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SimilarProfileEntry {
    pub username: String,
    pub score: f64,
}

/// Similar profiles sourced from `PrimaryProfile.similar`, scored by
/// descending rank (spec §6 "per-profile score decreasing by rank").
pub async fn similar_profiles(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<impl IntoResponse> {
    let profile = state
        .store
        .get_primary(&username)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("profile '{username}' not found")))?;
    let limit = query.limit.unwrap_or(20).clamp(1, 20) as usize;
    let total = profile.similar.len().max(1);
    let entries: Vec<SimilarProfileEntry> = profile
        .similar
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(rank, username)| SimilarProfileEntry {
            username,
            score: ((1.0 - rank as f64 / total as f64) * 1000.0).round() / 1000.0,
        })
        .collect();
    Ok(Envelope::new(entries))
}

pub async fn secondary_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let secondary = state
        .store
        .get_secondary(&username)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("secondary profile '{username}' not found")))?;
    Ok(Envelope::new(secondary))
}

#[derive(Debug, Deserialize, Default)]
pub struct RequestQuery {
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestResponse {
    pub queued: bool,
    pub message: String,
    pub estimated_time: Option<String>,
}

/// `POST /api/profile/{username}/request` — idempotent against an existing
/// `PrimaryProfile` or an active queue row (spec §6).
pub async fn request_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<RequestQuery>,
) -> ApiResult<impl IntoResponse> {
    if state.store.get_primary(&username).await?.is_some() {
        return Ok(Envelope::new(RequestResponse {
            queued: false,
            message: "profile already scraped".to_string(),
            estimated_time: None,
        }));
    }

    let source = query.source.unwrap_or_else(|| "api".to_string());
    let item = QueueItem::new(username, source, Priority::High);
    let queued = state.queue.enqueue(&item).await?;
    let message = if queued { "Profile is pending".to_string() } else { "already queued".to_string() };
    Ok(Envelope::new(RequestResponse { queued, message, estimated_time: Some("30s".to_string()) }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub completed: bool,
    pub status: String,
    pub message: String,
    pub attempts: Option<i32>,
}

pub async fn profile_status(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if state.store.get_primary(&username).await?.is_some() {
        return Ok(Envelope::new(StatusResponse {
            completed: true,
            status: "completed".to_string(),
            message: "Analysis completed".to_string(),
            attempts: None,
        }));
    }

    let Some(item) = state.store.latest_queue_item_for_username(&username).await? else {
        return Ok(Envelope::new(StatusResponse {
            completed: false,
            status: "unknown".to_string(),
            message: "profile has not been requested".to_string(),
            attempts: None,
        }));
    };

    let (status, message) = match item.status {
        QueueStatus::Pending => ("pending", "Profile is pending"),
        QueueStatus::Processing => ("processing", "Processing"),
        QueueStatus::Completed => ("completed", "Analysis completed"),
        QueueStatus::Failed => ("failed", "Processing failed"),
        QueueStatus::Paused => ("paused", "Processing paused"),
    };
    Ok(Envelope::new(StatusResponse {
        completed: matches!(item.status, QueueStatus::Completed),
        status: status.to_string(),
        message: message.to_string(),
        attempts: Some(item.attempts),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetSessionQuery {
    pub session_id: String,
}

/// No durable per-session state lives outside the rows already keyed by
/// `session_id` (`ViralAnalysisRequest`); this is an acknowledgement hook
/// for the frontend's local-state reset, not a data-clearing operation.
pub async fn reset_session(Query(query): Query<ResetSessionQuery>) -> impl IntoResponse {
    tracing::info!(session_id = %query.session_id, "session reset acknowledged");
    Envelope::new(serde_json::json!({"reset": true}))
}

#[derive(Debug, Deserialize)]
pub struct SimilarFastQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub force_refresh: Option<bool>,
}

pub async fn similar_fast(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<SimilarFastQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 80) as usize;
    let force_refresh = query.force_refresh.unwrap_or(false);

    let cached = state.store.similar_cache_for(&username).await?;
    let stale = cached.is_empty() || cached.iter().all(|c| c.is_stale(SIMILAR_CACHE_TTL_HOURS));

    let rows = if force_refresh || stale {
        let similar = state
            .pipeline
            .similar_fetcher
            .fetch_similar(&username)
            .await
            .map_err(|e| ApiError::internal_error(format!("similar-profiles fetch failed: {e}")))?;
        let batch_id = Uuid::new_v4().to_string();
        let fresh: Vec<SimilarProfilesCache> = similar
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, descriptor)| SimilarProfilesCache {
                primary_username: username.clone(),
                similar_username: descriptor.username,
                name: descriptor.full_name,
                image_key: None,
                rank: rank as i32,
                batch_id: batch_id.clone(),
                created_at: chrono::Utc::now(),
                image_downloaded: false,
            })
            .collect();
        state.store.upsert_similar_cache_batch(&fresh).await?;
        fresh
    } else {
        cached
    };

    let mut rows = rows;
    rows.truncate(limit);
    Ok(Envelope::new(rows))
}

/// `POST /api/profile/{primary}/add-competitor/{target}` — manual
/// competitor add: minimal profile fetch, avatar upload, cache upsert.
pub async fn add_competitor(
    State(state): State<Arc<AppState>>,
    Path((primary, target)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let external = state
        .pipeline
        .profile_fetcher
        .fetch_profile(&target)
        .await
        .map_err(|e| ApiError::internal_error(format!("profile fetch failed: {e}")))?;

    let image_key = crate::pipeline::images::acquire_image(
        &state.pipeline.http,
        &state.store,
        &primary,
        &target,
        "avatar",
        external.avatar_url.as_deref(),
    )
    .await;

    let existing = state.store.similar_cache_for(&primary).await?;
    let next_rank = existing.iter().map(|c| c.rank).max().map(|r| r + 1).unwrap_or(0);
    let row = SimilarProfilesCache {
        primary_username: primary,
        similar_username: target,
        name: external.display_name,
        image_key: image_key.clone(),
        rank: next_rank,
        batch_id: Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now(),
        image_downloaded: image_key.is_some(),
    };
    state.store.upsert_similar_cache_batch(std::slice::from_ref(&row)).await?;
    Ok(Envelope::new(row))
}
