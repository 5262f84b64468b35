//! Viral-analysis accessors (spec §3): `ViralAnalysisRequest`/`Run`/`Reel`/
//! `Script` rows, owned for writes by C7/C8.

use crate::models::{
    ContentStrategy, ReelRole, RunKind, RunStatus, ViralAnalysisReel, ViralAnalysisRequest,
    ViralAnalysisRun, ViralRequestStatus, ViralScript,
};
use crate::utils::{ApiResult, StringExt};

use super::Store;

impl Store {
    pub async fn create_viral_request(
        &self,
        session_id: &str,
        primary_username: &str,
        competitors: &[String],
        strategy: &ContentStrategy,
    ) -> ApiResult<ViralAnalysisRequest> {
        let strategy_json = serde_json::to_value(strategy)?;
        let request = sqlx::query_as::<_, ViralAnalysisRequest>(
            r#"
            INSERT INTO viral_analysis_requests (
                session_id, primary_username, competitors, strategy, status,
                progress, current_step, submitted_at, total_runs
            )
            VALUES ($1,$2,$3,$4,'pending',0,'submitted',now(),0)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(primary_username.normalized_username())
        .bind(competitors)
        .bind(strategy_json)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    pub async fn get_viral_request(&self, id: i64) -> ApiResult<Option<ViralAnalysisRequest>> {
        let request = sqlx::query_as::<_, ViralAnalysisRequest>(
            "SELECT * FROM viral_analysis_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    /// Claims a `pending` request, or a `completed`/`failed` request whose
    /// `nextScheduledRun` has arrived (the recurring-run path re-enters
    /// `processing` from either terminal status).
    pub async fn claim_viral_request(&self, id: i64) -> ApiResult<Option<ViralAnalysisRequest>> {
        let request = sqlx::query_as::<_, ViralAnalysisRequest>(
            r#"
            UPDATE viral_analysis_requests
            SET status = 'processing', started_at = now(), progress = 10, current_step = 'claimed'
            WHERE id = $1
              AND (status = 'pending'
                   OR (status IN ('completed', 'failed') AND next_scheduled_run IS NOT NULL AND next_scheduled_run <= now()))
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    pub async fn update_viral_request_progress(
        &self,
        id: i64,
        progress: i16,
        current_step: &str,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE viral_analysis_requests SET progress = $2, current_step = $3 WHERE id = $1")
            .bind(id)
            .bind(progress)
            .bind(current_step)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn finish_viral_request(
        &self,
        id: i64,
        status: ViralRequestStatus,
        next_scheduled_run: Option<chrono::DateTime<chrono::Utc>>,
    ) -> ApiResult<()> {
        sqlx::query(
            r#"
            UPDATE viral_analysis_requests
            SET status = $2, progress = 100, current_step = 'done', completed_at = now(),
                total_runs = total_runs + 1, next_scheduled_run = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(next_scheduled_run)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_last_discovery_fetch(&self, id: i64, at: chrono::DateTime<chrono::Utc>) -> ApiResult<()> {
        sqlx::query("UPDATE viral_analysis_requests SET last_discovery_fetch_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `run#` is monotonically increasing per request (spec §3).
    pub async fn create_viral_run(&self, request_id: i64, kind: RunKind) -> ApiResult<ViralAnalysisRun> {
        let run = sqlx::query_as::<_, ViralAnalysisRun>(
            r#"
            INSERT INTO viral_analysis_runs (
                request_id, run_number, kind, status, primary_reels_count,
                competitor_reels_count, transcripts_fetched, workflow_version,
                analysis_data, started_at
            )
            SELECT $1,
                   COALESCE(MAX(run_number), 0) + 1,
                   $2, 'pending', 0, 0, 0, 1, '{}'::jsonb, now()
            FROM viral_analysis_runs WHERE request_id = $1
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(run)
    }

    pub async fn update_run_status(&self, run_id: i64, status: RunStatus) -> ApiResult<()> {
        sqlx::query("UPDATE viral_analysis_runs SET status = $2 WHERE id = $1")
            .bind(run_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_reel_counts(
        &self,
        run_id: i64,
        primary_reels_count: i32,
        competitor_reels_count: i32,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE viral_analysis_runs SET primary_reels_count = $2, competitor_reels_count = $3 WHERE id = $1",
        )
        .bind(run_id)
        .bind(primary_reels_count)
        .bind(competitor_reels_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn increment_transcripts_fetched(&self, run_id: i64) -> ApiResult<()> {
        sqlx::query("UPDATE viral_analysis_runs SET transcripts_fetched = transcripts_fetched + 1 WHERE id = $1")
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn save_run_analysis(
        &self,
        run_id: i64,
        analysis_data: &serde_json::Value,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE viral_analysis_runs SET analysis_data = $2, analysis_completed_at = now(), status = 'completed' WHERE id = $1",
        )
        .bind(run_id)
        .bind(analysis_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_viral_reel(
        &self,
        run_id: i64,
        content_id: &str,
        role: ReelRole,
        selection_rank: i32,
        metrics_snapshot: &serde_json::Value,
    ) -> ApiResult<ViralAnalysisReel> {
        let reel = sqlx::query_as::<_, ViralAnalysisReel>(
            r#"
            INSERT INTO viral_analysis_reels (
                run_id, content_id, role, selection_rank, metrics_snapshot,
                transcript_requested, transcript_completed, power_words
            )
            VALUES ($1,$2,$3,$4,$5,false,false,'{}')
            RETURNING *
            "#,
        )
        .bind(run_id)
        .bind(content_id)
        .bind(role)
        .bind(selection_rank)
        .bind(metrics_snapshot)
        .fetch_one(&self.pool)
        .await?;
        Ok(reel)
    }

    pub async fn mark_transcript_result(
        &self,
        reel_id: i64,
        completed: bool,
        error: Option<&str>,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE viral_analysis_reels SET transcript_requested = true, transcript_completed = $2, transcript_error = $3 WHERE id = $1",
        )
        .bind(reel_id)
        .bind(completed)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_reel_hook(
        &self,
        reel_id: i64,
        hook_text: &str,
        power_words: &[String],
    ) -> ApiResult<()> {
        sqlx::query("UPDATE viral_analysis_reels SET hook_text = $2, power_words = $3 WHERE id = $1")
            .bind(reel_id)
            .bind(hook_text)
            .bind(power_words)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reels_for_run(&self, run_id: i64) -> ApiResult<Vec<ViralAnalysisReel>> {
        let reels = sqlx::query_as::<_, ViralAnalysisReel>(
            "SELECT * FROM viral_analysis_reels WHERE run_id = $1 ORDER BY selection_rank ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reels)
    }

    pub async fn insert_script(&self, script: &ViralScript) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO viral_scripts (
                run_id, title, content, primary_hook, call_to_action, kind,
                duration_secs, source_reels
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(script.run_id)
        .bind(&script.title)
        .bind(&script.content)
        .bind(&script.primary_hook)
        .bind(&script.call_to_action)
        .bind(&script.kind)
        .bind(script.duration_secs)
        .bind(&script.source_reels)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn scripts_for_run(&self, run_id: i64) -> ApiResult<Vec<ViralScript>> {
        let scripts = sqlx::query_as::<_, ViralScript>(
            "SELECT * FROM viral_scripts WHERE run_id = $1 ORDER BY id ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(scripts)
    }

    pub async fn runs_for_request(&self, request_id: i64) -> ApiResult<Vec<ViralAnalysisRun>> {
        let runs = sqlx::query_as::<_, ViralAnalysisRun>(
            "SELECT * FROM viral_analysis_runs WHERE request_id = $1 ORDER BY run_number ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    /// Latest `completed` run for a request, falling back to the latest run
    /// of any status (spec §6 `/check-existing`).
    pub async fn latest_run_for_request(&self, request_id: i64) -> ApiResult<Option<ViralAnalysisRun>> {
        let completed = sqlx::query_as::<_, ViralAnalysisRun>(
            "SELECT * FROM viral_analysis_runs WHERE request_id = $1 AND status = 'completed' ORDER BY run_number DESC LIMIT 1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        if completed.is_some() {
            return Ok(completed);
        }
        let any = sqlx::query_as::<_, ViralAnalysisRun>(
            "SELECT * FROM viral_analysis_runs WHERE request_id = $1 ORDER BY run_number DESC LIMIT 1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(any)
    }

    /// Next request the workflow engine should process: an unclaimed
    /// `pending` request, or a `completed`/`failed` request whose
    /// `nextScheduledRun` has arrived (spec §4.7 recurring runs). Oldest
    /// first.
    pub async fn next_runnable_viral_request(&self) -> ApiResult<Option<ViralAnalysisRequest>> {
        let request = sqlx::query_as::<_, ViralAnalysisRequest>(
            r#"
            SELECT * FROM viral_analysis_requests
            WHERE status = 'pending'
               OR (status IN ('completed', 'failed') AND next_scheduled_run IS NOT NULL AND next_scheduled_run <= now())
            ORDER BY submitted_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    pub async fn request_for_username(&self, primary_username: &str) -> ApiResult<Option<ViralAnalysisRequest>> {
        let request = sqlx::query_as::<_, ViralAnalysisRequest>(
            "SELECT * FROM viral_analysis_requests WHERE primary_username = $1 ORDER BY submitted_at DESC LIMIT 1",
        )
        .bind(primary_username.normalized_username())
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    /// For `GET /api/viral-ideas/queue/{session_id}` (spec §6).
    pub async fn request_for_session_id(&self, session_id: &str) -> ApiResult<Option<ViralAnalysisRequest>> {
        let request = sqlx::query_as::<_, ViralAnalysisRequest>(
            "SELECT * FROM viral_analysis_requests WHERE session_id = $1 ORDER BY submitted_at DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }
}
