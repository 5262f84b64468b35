use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViralRequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentStrategy {
    pub content_type: String,
    pub target_audience: String,
    pub goals: Vec<String>,
}

/// One active request per (session, primary) at a time (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ViralAnalysisRequest {
    pub id: i64,
    pub session_id: String,
    pub primary_username: String,
    pub competitors: Vec<String>,
    #[sqlx(json)]
    pub strategy: ContentStrategy,
    pub status: ViralRequestStatus,
    pub progress: i16,
    pub current_step: String,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_scheduled_run: Option<DateTime<Utc>>,
    pub total_runs: i32,
    /// Set by the discovery routine on recurring runs (spec §4.7); not part
    /// of the original distilled schema, carried forward from
    /// `viral_ideas_processor.py`'s `last_discovery_fetch_at`.
    pub last_discovery_fetch_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Initial,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    TranscriptsCompleted,
    Completed,
    Failed,
}

/// `run#` is monotonically increasing per request (spec §3, §8).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ViralAnalysisRun {
    pub id: i64,
    pub request_id: i64,
    #[sqlx(rename = "run_number")]
    pub run: i32,
    pub kind: RunKind,
    pub status: RunStatus,
    pub primary_reels_count: i32,
    pub competitor_reels_count: i32,
    pub transcripts_fetched: i32,
    pub workflow_version: i32,
    /// Canonical output (spec §4.8, §9 Open Questions): `{profile_analysis,
    /// individual_reel_analyses, generated_hooks, complete_scripts,
    /// analysis_summary}`.
    #[sqlx(json)]
    pub analysis_data: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub analysis_completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReelRole {
    Primary,
    Competitor,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ViralAnalysisReel {
    pub id: i64,
    pub run_id: i64,
    pub content_id: String,
    pub role: ReelRole,
    pub selection_rank: i32,
    /// Metrics snapshot at selection time (spec §3); stored as JSON so the
    /// snapshot survives later recomputation of the live `Content` row.
    #[sqlx(json)]
    pub metrics_snapshot: serde_json::Value,
    pub transcript_requested: bool,
    pub transcript_completed: bool,
    pub transcript_error: Option<String>,
    pub hook_text: Option<String>,
    pub power_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceReelsRef {
    pub based_on_competitor: String,
    pub original_competitor_hook: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ViralScript {
    pub id: i64,
    pub run_id: i64,
    pub title: String,
    pub content: String,
    pub primary_hook: String,
    pub call_to_action: String,
    pub kind: String,
    pub duration_secs: i32,
    #[sqlx(json)]
    pub source_reels: serde_json::Value,
}
