//! Viral workflow engine (C7, spec §4.7): the `pending -> processing ->
//! transcripts_completed -> completed|failed` state machine, grounded in
//! `viral_ideas_processor.py`'s `_process_initial_analysis` /
//! `_process_recurring_analysis` / `_select_reels_with_transcripts`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use crate::fetchers::transcript::fetch_with_soft_failure;
use crate::fetchers::TranscriptFetcher;
use crate::models::{Content, ReelRole, RunKind, RunStatus, ViralAnalysisRequest, ViralRequestStatus, ViralScript};
use crate::pipeline::Pipeline;
use crate::store::Store;
use crate::utils::ApiResult;
use crate::viral::ai::{run_ai_pipeline, ProfileSignals, ReelForAnalysis};

const INITIAL_PRIMARY_MAX_REELS: usize = 100;
const INITIAL_COMPETITOR_MAX_REELS: usize = 25;
const RECURRING_REFRESH_MAX_REELS: usize = 25;
const RECURRING_COMPETITOR_REEL_TARGET: usize = 5;

const PRIMARY_TRANSCRIPT_TARGET: usize = 3;
const PRIMARY_TRANSCRIPT_MAX_ATTEMPTS: usize = 10;
const COMPETITOR_TRANSCRIPT_TARGET: usize = 5;
const COMPETITOR_TRANSCRIPT_MAX_ATTEMPTS: usize = 20;

const LAST_30_DAYS: i64 = 30;
const NEXT_RUN_INTERVAL_HOURS: i64 = 24;

/// Adaptive polling cadence (spec §5): fast after finding work, backing
/// off across three steps when the queue has been empty.
const POLL_INTERVAL_BUSY_MS: u64 = 500;
const POLL_BACKOFF_SCHEDULE_SECS: [u64; 3] = [2, 5, 10];

struct ReelCandidate {
    content: Content,
    role: ReelRole,
}

pub struct ViralEngine {
    store: Arc<Store>,
    pipeline: Arc<Pipeline>,
    transcript_fetcher: Arc<dyn TranscriptFetcher>,
}

impl ViralEngine {
    pub fn new(store: Arc<Store>, pipeline: Arc<Pipeline>, transcript_fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        Self { store, pipeline, transcript_fetcher }
    }

    /// Runs one request end to end. Never propagates a mid-run error to the
    /// caller: on failure the request/run are marked `failed` and logged,
    /// so one bad run never kills the polling loop (spec §5 "cancellation
    /// mid-run leaves the run in its current status").
    pub async fn process_request(&self, request_id: i64) -> ApiResult<()> {
        let Some(request) = self.store.claim_viral_request(request_id).await? else {
            return Ok(());
        };

        if let Err(e) = self.try_process(&request).await {
            tracing::error!(request_id, error = %e, "viral run failed");
            let _ = self.store.finish_viral_request(request.id, ViralRequestStatus::Failed, None).await;
        }
        Ok(())
    }

    async fn try_process(&self, request: &ViralAnalysisRequest) -> ApiResult<()> {
        let kind = if request.total_runs == 0 { RunKind::Initial } else { RunKind::Recurring };
        let run = self.store.create_viral_run(request.id, kind).await?;

        self.store.update_viral_request_progress(request.id, 20, "fetching profiles").await?;

        let candidates = match kind {
            RunKind::Initial => self.fetch_initial(request).await?,
            RunKind::Recurring => self.fetch_recurring(request).await?,
        };

        self.store.update_viral_request_progress(request.id, 60, "selecting reels").await?;
        let primary_count = candidates.iter().filter(|c| c.role == ReelRole::Primary).count() as i32;
        let competitor_count = candidates.iter().filter(|c| c.role == ReelRole::Competitor).count() as i32;
        self.store.record_reel_counts(run.id, primary_count, competitor_count).await?;

        let mut reel_ids = Vec::new();
        for (rank, candidate) in candidates.iter().enumerate() {
            let snapshot = serde_json::json!({
                "view_count": candidate.content.view_count,
                "like_count": candidate.content.like_count,
                "outlier_score": candidate.content.outlier_score,
            });
            let reel = self
                .store
                .insert_viral_reel(run.id, &candidate.content.content_id, candidate.role, rank as i32, &snapshot)
                .await?;
            reel_ids.push((reel.id, candidate));
        }

        self.store.update_viral_request_progress(request.id, 70, "processing transcripts").await?;
        let transcripts = self.select_transcripts(run.id, &reel_ids).await?;

        self.store.update_run_status(run.id, RunStatus::TranscriptsCompleted).await?;

        self.store.update_viral_request_progress(request.id, 85, "ai").await?;
        self.run_ai_stage(request, run.id, &reel_ids, &transcripts).await?;

        let next_scheduled_run = Some(Utc::now() + ChronoDuration::hours(NEXT_RUN_INTERVAL_HOURS));
        if matches!(kind, RunKind::Recurring) {
            self.store.set_last_discovery_fetch(request.id, Utc::now()).await?;
        }
        self.store.update_viral_request_progress(request.id, 100, "done").await?;
        self.store.finish_viral_request(request.id, ViralRequestStatus::Completed, next_scheduled_run).await?;
        Ok(())
    }

    async fn fetch_initial(&self, request: &ViralAnalysisRequest) -> ApiResult<Vec<ReelCandidate>> {
        let primary_content = self.pipeline.run_viral_initial(&request.primary_username, INITIAL_PRIMARY_MAX_REELS).await?;
        if primary_content.is_empty() {
            tracing::warn!(primary = %request.primary_username, "initial run fetched zero primary reels");
        }

        for competitor in &request.competitors {
            if let Err(e) = self.pipeline.run_viral_initial(competitor, INITIAL_COMPETITOR_MAX_REELS).await {
                tracing::warn!(competitor, error = %e, "competitor fetch failed, skipping (not fatal)");
            }
        }

        let since = Utc::now() - ChronoDuration::days(LAST_30_DAYS);
        let mut primary_reels = self
            .store
            .top_content_for_owner(&request.primary_username, Some("reel"), Some(since), PRIMARY_TRANSCRIPT_MAX_ATTEMPTS as i64)
            .await?;
        if primary_reels.is_empty() {
            primary_reels = self
                .store
                .top_content_for_owner(&request.primary_username, Some("reel"), None, PRIMARY_TRANSCRIPT_MAX_ATTEMPTS as i64)
                .await?;
        }

        let mut candidates: Vec<ReelCandidate> =
            primary_reels.into_iter().map(|content| ReelCandidate { content, role: ReelRole::Primary }).collect();

        for competitor in &request.competitors {
            let top = self
                .store
                .top_content_for_owner(competitor, Some("reel"), None, COMPETITOR_TRANSCRIPT_MAX_ATTEMPTS as i64)
                .await?;
            candidates.extend(top.into_iter().map(|content| ReelCandidate { content, role: ReelRole::Competitor }));
        }

        Ok(candidates)
    }

    /// Recurring run (spec §4.7): refresh each participating username,
    /// select the top newly-discovered competitor reels since the previous
    /// `lastDiscoveryFetchAt`, and skip primary selection entirely.
    async fn fetch_recurring(&self, request: &ViralAnalysisRequest) -> ApiResult<Vec<ReelCandidate>> {
        let since = request.last_discovery_fetch_at.unwrap_or(request.submitted_at);

        for competitor in &request.competitors {
            if let Err(e) = self.pipeline.run_viral_refresh(competitor, RECURRING_REFRESH_MAX_REELS).await {
                tracing::warn!(competitor, error = %e, "competitor refresh failed, skipping (not fatal)");
            }
        }

        let mut discovered = Vec::new();
        for competitor in &request.competitors {
            let fresh = self.store.top_content_for_owner(competitor, Some("reel"), Some(since), RECURRING_REFRESH_MAX_REELS as i64).await?;
            discovered.extend(fresh);
        }
        discovered.sort_by(|a, b| b.outlier_score.partial_cmp(&a.outlier_score).unwrap_or(std::cmp::Ordering::Equal));
        discovered.truncate(RECURRING_COMPETITOR_REEL_TARGET);

        Ok(discovered.into_iter().map(|content| ReelCandidate { content, role: ReelRole::Competitor }).collect())
    }

    /// Smart transcript selection (spec §4.7): iterate candidates by rank
    /// per role, stop each role once its target is reached or its
    /// max-attempts budget is exhausted. Returns fetched transcripts keyed
    /// by `content_id` for the AI stage.
    async fn select_transcripts(
        &self,
        run_id: i64,
        reel_ids: &[(i64, &ReelCandidate)],
    ) -> ApiResult<HashMap<String, String>> {
        let mut transcripts = HashMap::new();
        let mut primary_completed = 0usize;
        let mut primary_attempts = 0usize;
        let mut competitor_completed = 0usize;
        let mut competitor_attempts = 0usize;

        for (reel_id, candidate) in reel_ids {
            let (completed, attempts, target, max_attempts) = match candidate.role {
                ReelRole::Primary => (&mut primary_completed, &mut primary_attempts, PRIMARY_TRANSCRIPT_TARGET, PRIMARY_TRANSCRIPT_MAX_ATTEMPTS),
                ReelRole::Competitor => {
                    (&mut competitor_completed, &mut competitor_attempts, COMPETITOR_TRANSCRIPT_TARGET, COMPETITOR_TRANSCRIPT_MAX_ATTEMPTS)
                },
            };
            if *completed >= target || *attempts >= max_attempts {
                continue;
            }
            *attempts += 1;

            match fetch_with_soft_failure(self.transcript_fetcher.as_ref(), &candidate.content.content_id).await {
                Ok(Some(transcript)) => {
                    transcripts.insert(candidate.content.content_id.clone(), transcript.full_text());
                    self.store.mark_transcript_result(*reel_id, true, None).await?;
                    self.store.increment_transcripts_fetched(run_id).await?;
                    *completed += 1;
                },
                Ok(None) => {
                    self.store.mark_transcript_result(*reel_id, false, Some("transcript unavailable")).await?;
                },
                Err(e) => {
                    self.store.mark_transcript_result(*reel_id, false, Some(&e.to_string())).await?;
                },
            }
        }

        Ok(transcripts)
    }

    async fn run_ai_stage(
        &self,
        request: &ViralAnalysisRequest,
        run_id: i64,
        reel_ids: &[(i64, &ReelCandidate)],
        transcripts: &HashMap<String, String>,
    ) -> ApiResult<()> {
        let primary_profile = self.store.get_primary(&request.primary_username).await?;
        let signals = ProfileSignals {
            username: request.primary_username.clone(),
            bio: primary_profile.as_ref().and_then(|p| p.bio.clone()),
            primary_category: primary_profile.as_ref().and_then(|p| p.primary_category.clone()),
            recent_captions: Vec::new(),
            metrics: primary_profile.as_ref().map(|p| p.agg_metrics()).unwrap_or_default(),
        };

        let reels: Vec<ReelForAnalysis> = reel_ids
            .iter()
            .map(|(_, candidate)| ReelForAnalysis {
                content_id: candidate.content.content_id.clone(),
                username: candidate.content.profile_owner.clone(),
                role: candidate.role,
                caption: candidate.content.description.clone(),
                transcript_text: transcripts.get(&candidate.content.content_id).cloned(),
                outlier_score: candidate.content.outlier_score,
            })
            .collect();

        let output = run_ai_pipeline(self.pipeline.llm.clone(), &signals, &reels).await;

        let content_id_to_reel_id: HashMap<&str, i64> =
            reel_ids.iter().map(|(reel_id, candidate)| (candidate.content.content_id.as_str(), *reel_id)).collect();
        for hook in &output.reel_hooks {
            if let Some(reel_id) = content_id_to_reel_id.get(hook.content_id.as_str()) {
                self.store.save_reel_hook(*reel_id, &hook.hook_text, &hook.power_words).await?;
            }
        }

        for script in &output.scripts {
            let row = ViralScript {
                id: 0,
                run_id,
                title: script.title.clone(),
                content: script.content.clone(),
                primary_hook: script.primary_hook.clone(),
                call_to_action: script.call_to_action.clone(),
                kind: "generated".to_string(),
                duration_secs: script.duration_secs,
                source_reels: script.source_reels.clone(),
            };
            self.store.insert_script(&row).await?;
        }

        self.store.save_run_analysis(run_id, &output.analysis_data).await
    }
}

/// Cooperative polling loop (spec §5): claims and processes one runnable
/// request at a time, backing off across [`POLL_BACKOFF_SCHEDULE_SECS`]
/// after consecutive empty checks.
pub struct ViralWorkflowLoop {
    store: Arc<Store>,
    engine: Arc<ViralEngine>,
    shutting_down: AtomicBool,
}

impl ViralWorkflowLoop {
    pub fn new(store: Arc<Store>, engine: Arc<ViralEngine>) -> Arc<Self> {
        Arc::new(Self { store, engine, shutting_down: AtomicBool::new(false) })
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub async fn run_forever(self: Arc<Self>) {
        let mut empty_checks = 0usize;
        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                break;
            }

            match self.store.next_runnable_viral_request().await {
                Ok(Some(request)) => {
                    empty_checks = 0;
                    if let Err(e) = self.engine.process_request(request.id).await {
                        tracing::error!(request_id = request.id, error = %e, "viral workflow loop iteration failed");
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_BUSY_MS)).await;
                },
                Ok(None) => {
                    let idx = empty_checks.min(POLL_BACKOFF_SCHEDULE_SECS.len() - 1);
                    tokio::time::sleep(std::time::Duration::from_secs(POLL_BACKOFF_SCHEDULE_SECS[idx])).await;
                    empty_checks += 1;
                },
                Err(e) => {
                    tracing::error!(error = %e, "failed to poll for runnable viral requests");
                    tokio::time::sleep(std::time::Duration::from_secs(POLL_BACKOFF_SCHEDULE_SECS[0])).await;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_targets_match_spec_bounds() {
        assert_eq!(PRIMARY_TRANSCRIPT_TARGET, 3);
        assert_eq!(PRIMARY_TRANSCRIPT_MAX_ATTEMPTS, 10);
        assert_eq!(COMPETITOR_TRANSCRIPT_TARGET, 5);
        assert_eq!(COMPETITOR_TRANSCRIPT_MAX_ATTEMPTS, 20);
    }

    #[test]
    fn poll_backoff_schedule_is_ascending() {
        for pair in POLL_BACKOFF_SCHEDULE_SECS.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
