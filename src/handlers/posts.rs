//! `GET /api/posts` (spec §6): same shape as `/api/reels`, forced to
//! `content_types=post` with a likes-centric default sort.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::handlers::reels::{build_filter, ContentListResponse, ContentQuery};
use crate::utils::{ApiResult, Envelope};
use crate::AppState;

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(mut query): Query<ContentQuery>,
) -> ApiResult<impl IntoResponse> {
    if query.sort_by.is_none() {
        query.sort_by = Some("likes".to_string());
    }
    let filter = build_filter(query, Some("post"));
    let (reels, is_last_page) = state.store.search_content(&filter).await?;
    Ok(Envelope::new(ContentListResponse { reels, is_last_page }))
}
