//! `GET /api/filter-options` (spec §6).

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::utils::{ApiResult, Envelope};
use crate::AppState;

/// Fixed vocabularies the store doesn't derive from `contents` rows.
const ACCOUNT_TYPES: &[&str] = &["Personal", "Business Page", "Influencer"];
const CONTENT_TYPES: &[&str] = &["reel", "post"];
const LANGUAGES: &[&str] = &["en", "es", "pt", "fr", "de"];

#[derive(Debug, Serialize, ToSchema)]
pub struct FilterOptionsResponse {
    pub primary_categories: Vec<String>,
    pub secondary_categories: Vec<String>,
    pub tertiary_categories: Vec<String>,
    pub keywords: Vec<String>,
    pub usernames: Vec<String>,
    pub account_types: Vec<String>,
    pub content_types: Vec<String>,
    pub languages: Vec<String>,
    pub content_styles: Vec<String>,
}

pub async fn filter_options(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let distinct = state.store.distinct_content_filter_values().await?;
    Ok(Envelope::new(FilterOptionsResponse {
        primary_categories: distinct.primary_categories,
        secondary_categories: distinct.secondary_categories,
        tertiary_categories: distinct.tertiary_categories,
        keywords: distinct.keywords,
        usernames: distinct.usernames,
        account_types: ACCOUNT_TYPES.iter().map(|s| s.to_string()).collect(),
        content_types: CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
        languages: LANGUAGES.iter().map(|s| s.to_string()).collect(),
        content_styles: distinct.content_styles,
    }))
}
