//! `/api/viral-analysis/*` (spec §6).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::{PrimaryProfile, ReelRole, SecondaryProfile, ViralAnalysisReel, ViralScript};
use crate::utils::{ApiError, ApiResult, Envelope};
use crate::AppState;

/// `GET /api/viral-analysis/{queue_id}/results` (spec §6): the run's
/// `analysisData` JSON is canonical; everything else is resolved from the
/// relational rows it references.
pub async fn results(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .store
        .get_viral_request(queue_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("viral-ideas request {queue_id} not found")))?;
    let run = state
        .store
        .latest_run_for_request(queue_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no runs for viral-ideas request {queue_id}")))?;

    let primary_profile: Option<PrimaryProfile> = state.store.get_primary(&request.primary_username).await?;
    let mut competitor_profiles: Vec<SecondaryProfile> = Vec::new();
    for competitor in &request.competitors {
        if let Some(profile) = state.store.get_secondary(competitor).await? {
            competitor_profiles.push(profile);
        }
    }

    let reels = state.store.reels_for_run(run.id).await?;
    let (primary_reels, competitor_reel_refs): (Vec<&ViralAnalysisReel>, Vec<&ViralAnalysisReel>) =
        reels.iter().partition(|r| matches!(r.role, ReelRole::Primary));

    let all_content_ids: Vec<String> = reels.iter().map(|r| r.content_id.clone()).collect();
    let content_rows = state.store.content_by_ids(&all_content_ids).await?;
    let content_by_id: std::collections::HashMap<&str, &crate::models::Content> =
        content_rows.iter().map(|c| (c.content_id.as_str(), c)).collect();

    let primary_user_reels: Vec<_> = primary_reels
        .iter()
        .filter_map(|r| content_by_id.get(r.content_id.as_str()).copied())
        .collect();
    let competitor_reels: Vec<_> = competitor_reel_refs
        .iter()
        .filter_map(|r| content_by_id.get(r.content_id.as_str()).copied())
        .collect();
    let analyzed_reels: Vec<_> = content_by_id.values().copied().collect();

    let scripts: Vec<ViralScript> = state.store.scripts_for_run(run.id).await?;

    let analysis_data = run.analysis_data.clone();
    let profile_analysis = analysis_data.get("profile_analysis").cloned().unwrap_or(Value::Null);
    let generated_hooks = analysis_data.get("generated_hooks").cloned().unwrap_or_else(|| json!([]));
    let individual_reel_analyses =
        analysis_data.get("individual_reel_analyses").cloned().unwrap_or_else(|| json!([]));
    let complete_scripts = analysis_data.get("complete_scripts").cloned().unwrap_or_else(|| json!([]));
    let analysis_summary = analysis_data.get("analysis_summary").cloned().unwrap_or(Value::Null);

    Ok(Envelope::new(json!({
        "analysis": run,
        "primary_profile": primary_profile,
        "analyzed_reels": analyzed_reels,
        "primary_user_reels": primary_user_reels,
        "competitor_reels": competitor_reels,
        "competitor_profiles": competitor_profiles,
        "viral_scripts_table": scripts,
        "analysis_data": analysis_data,
        "profile_analysis": profile_analysis,
        "generated_hooks": generated_hooks,
        "individual_reel_analyses": individual_reel_analyses,
        "complete_scripts": complete_scripts,
        "scripts_summary": scripts,
        "analysis_summary": analysis_summary,
        "viral_ideas": generated_hooks,
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct AnalysisContentQuery {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// `GET /api/viral-analysis/{queue_id}/content` (spec §6).
pub async fn content(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<i64>,
    Query(query): Query<AnalysisContentQuery>,
) -> ApiResult<impl IntoResponse> {
    let run = state
        .store
        .latest_run_for_request(queue_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no runs for viral-ideas request {queue_id}")))?;
    let reels = state.store.reels_for_run(run.id).await?;

    let filtered: Vec<&ViralAnalysisReel> = match query.content_type.as_deref().unwrap_or("all") {
        "primary" => reels.iter().filter(|r| matches!(r.role, ReelRole::Primary)).collect(),
        "competitor" => reels.iter().filter(|r| matches!(r.role, ReelRole::Competitor)).collect(),
        _ => reels.iter().collect(),
    };

    let content_ids: Vec<String> = filtered.iter().map(|r| r.content_id.clone()).collect();
    let mut content_rows = state.store.content_by_ids(&content_ids).await?;
    content_rows.sort_by(|a, b| b.outlier_score.partial_cmp(&a.outlier_score).unwrap_or(std::cmp::Ordering::Equal));

    let offset = query.offset.unwrap_or(0).max(0) as usize;
    let limit = query.limit.unwrap_or(24).clamp(1, 100) as usize;
    let total = content_rows.len();
    let page: Vec<_> = content_rows.into_iter().skip(offset).take(limit).collect();

    Ok(Envelope::new(json!({
        "content": page,
        "total": total,
        "is_last_page": offset + limit >= total,
    })))
}
