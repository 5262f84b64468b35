//! Viral AI sub-pipeline (C8, spec §4.8): four LLM stages over the reels
//! selected for a run, composed into one JSON blob for
//! `ViralAnalysisRun.analysisData`. Every stage is parsed through the
//! categoriser's JSON-recovery chain; a stage that fails to parse falls
//! back to an empty object rather than failing the run (spec
//! "Robustness").

use std::sync::Arc;

use serde_json::{json, Value};

use crate::categoriser::json_recovery::recover_json;
use crate::fetchers::LlmChatFetcher;
use crate::models::{AggMetrics, ReelRole};

const TOP_REELS_FOR_HOOK_ANALYSIS: usize = 5;
const GENERATED_HOOK_COUNT: usize = 5;

#[derive(Debug, Clone)]
pub struct ProfileSignals {
    pub username: String,
    pub bio: Option<String>,
    pub primary_category: Option<String>,
    pub recent_captions: Vec<String>,
    pub metrics: AggMetrics,
}

#[derive(Debug, Clone)]
pub struct ReelForAnalysis {
    pub content_id: String,
    pub username: String,
    pub role: ReelRole,
    pub caption: Option<String>,
    pub transcript_text: Option<String>,
    pub outlier_score: f64,
}

/// One per-reel hook, keyed by `content_id` so the engine can persist
/// `hookText`/`powerWords` onto the matching `ViralAnalysisReel` row.
#[derive(Debug, Clone)]
pub struct ReelHookResult {
    pub content_id: String,
    pub hook_text: String,
    pub power_words: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedScript {
    pub title: String,
    pub content: String,
    pub primary_hook: String,
    pub call_to_action: String,
    pub duration_secs: i32,
    pub source_reels: Value,
}

pub struct AiPipelineOutput {
    pub analysis_data: Value,
    pub reel_hooks: Vec<ReelHookResult>,
    pub scripts: Vec<GeneratedScript>,
}

async fn call_llm_json(llm: &dyn LlmChatFetcher, system: &str, user: &str) -> Value {
    let raw = match llm.complete(system, user).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "viral AI stage call failed, falling back to empty object");
            return json!({});
        },
    };
    recover_json(&raw).unwrap_or_else(|| {
        tracing::warn!("viral AI stage response failed JSON recovery, falling back to empty object");
        json!({})
    })
}

async fn analyze_profile(llm: &dyn LlmChatFetcher, signals: &ProfileSignals) -> Value {
    let system = "You analyze an Instagram creator's positioning from aggregated signals. Respond with \
                  strict JSON: {\"positioning\": string, \"recurring_themes\": string[], \
                  \"audience_hypothesis\": string}."
        .to_string();
    let user = format!(
        "username: {}\nbio: {}\ncategory: {}\nrecent captions:\n{}\nmetrics: median_views={}, total_reels={}",
        signals.username,
        signals.bio.as_deref().unwrap_or(""),
        signals.primary_category.as_deref().unwrap_or("Uncategorized"),
        signals.recent_captions.join("\n"),
        signals.metrics.median_views,
        signals.metrics.total_reels,
    );
    call_llm_json(llm, &system, &user).await
}

async fn analyze_hook(llm: &dyn LlmChatFetcher, reel: &ReelForAnalysis) -> Value {
    let system = "You analyze why an Instagram reel's opening hook works. Respond with strict JSON: \
                  {\"hookText\": string, \"psychologicalTriggers\": string[], \"adaptationStrategy\": string}."
        .to_string();
    let transcript = reel.transcript_text.as_deref().unwrap_or("(no transcript available)");
    let user = format!(
        "username: {}\ncaption: {}\noutlierScore: {}\ntranscript: {transcript}",
        reel.username,
        reel.caption.as_deref().unwrap_or(""),
        reel.outlier_score,
    );
    call_llm_json(llm, &system, &user).await
}

async fn generate_hooks(llm: &dyn LlmChatFetcher, profile_analysis: &Value, reel_analyses: &[Value]) -> Value {
    let system = format!(
        "You generate {GENERATED_HOOK_COUNT} new hook ideas for a creator from a profile analysis and a \
         collection of analysed competitor/primary hooks. Respond with strict JSON: {{\"hooks\": \
         [{{\"hookText\": string, \"sourceUsername\": string, \"estimatedEffectiveness\": number (0-100), \
         \"psychologicalTriggers\": string[]}}]}}."
    );
    let user = format!(
        "profile analysis: {}\nanalysed hooks: {}",
        profile_analysis,
        serde_json::to_string(reel_analyses).unwrap_or_default()
    );
    call_llm_json(llm, &system, &user).await
}

async fn generate_script(llm: &dyn LlmChatFetcher, hook: &Value) -> Value {
    let system = "You write a short-form video script from a generated hook idea. Respond with strict \
                  JSON: {\"title\": string, \"content\": string, \"primaryHook\": string, \
                  \"callToAction\": string, \"estimatedDurationSecs\": number, \"sourceReels\": \
                  {\"basedOnCompetitor\": string, \"originalCompetitorHook\": string}}."
        .to_string();
    let user = serde_json::to_string(hook).unwrap_or_default();
    call_llm_json(llm, &system, &user).await
}

fn as_str(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn as_str_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Runs all four stages (spec §4.8) and composes `analysisData`. Reel
/// analysis only covers the top [`TOP_REELS_FOR_HOOK_ANALYSIS`] reels by
/// `outlierScore`, per primary/competitor mix as selected upstream.
pub async fn run_ai_pipeline(
    llm: Arc<dyn LlmChatFetcher>,
    signals: &ProfileSignals,
    reels: &[ReelForAnalysis],
) -> AiPipelineOutput {
    let profile_analysis = analyze_profile(llm.as_ref(), signals).await;

    let mut ranked = reels.to_vec();
    ranked.sort_by(|a, b| b.outlier_score.partial_cmp(&a.outlier_score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(TOP_REELS_FOR_HOOK_ANALYSIS);

    let mut individual_reel_analyses = Vec::new();
    let mut reel_hooks = Vec::new();
    for reel in &ranked {
        let analysis = analyze_hook(llm.as_ref(), reel).await;
        let hook_text = as_str(&analysis, "hookText");
        let power_words = as_str_array(&analysis, "psychologicalTriggers");
        reel_hooks.push(ReelHookResult {
            content_id: reel.content_id.clone(),
            hook_text: hook_text.clone(),
            power_words: power_words.clone(),
        });
        individual_reel_analyses.push(json!({
            "content_id": reel.content_id,
            "username": reel.username,
            "role": format!("{:?}", reel.role),
            "analysis": analysis,
        }));
    }

    let generated = generate_hooks(llm.as_ref(), &profile_analysis, &individual_reel_analyses).await;
    let hooks: Vec<Value> = generated.get("hooks").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut complete_scripts = Vec::new();
    let mut scripts = Vec::new();
    for hook in &hooks {
        let script = generate_script(llm.as_ref(), hook).await;
        let source_reels = script.get("sourceReels").cloned().unwrap_or_else(|| json!({}));
        scripts.push(GeneratedScript {
            title: as_str(&script, "title"),
            content: as_str(&script, "content"),
            primary_hook: as_str(&script, "primaryHook"),
            call_to_action: as_str(&script, "callToAction"),
            duration_secs: script.get("estimatedDurationSecs").and_then(Value::as_i64).unwrap_or(30) as i32,
            source_reels,
        });
        complete_scripts.push(script);
    }

    let analysis_data = json!({
        "profile_analysis": profile_analysis,
        "individual_reel_analyses": individual_reel_analyses,
        "generated_hooks": hooks,
        "complete_scripts": complete_scripts,
        "analysis_summary": {
            "total_hooks_analyzed": ranked.len(),
            "hooks_generated": hooks.len(),
            "scripts_created": scripts.len(),
        },
    });

    AiPipelineOutput { analysis_data, reel_hooks, scripts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::llm_chat::FakeLlmChatFetcher;

    #[tokio::test]
    async fn falls_back_to_empty_object_on_unparseable_response() {
        let fetcher = FakeLlmChatFetcher::new(vec!["not json at all".to_string()]);
        let value = call_llm_json(&fetcher, "system", "user").await;
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn pipeline_completes_with_empty_reels() {
        let fetcher: Arc<dyn LlmChatFetcher> = Arc::new(FakeLlmChatFetcher::new(vec![
            r#"{"positioning":"x","recurring_themes":[],"audience_hypothesis":"y"}"#.to_string(),
            r#"{"hooks":[]}"#.to_string(),
        ]));
        let signals = ProfileSignals {
            username: "mindset.therapy".into(),
            bio: None,
            primary_category: None,
            recent_captions: vec![],
            metrics: AggMetrics::default(),
        };
        let output = run_ai_pipeline(fetcher, &signals, &[]).await;
        assert_eq!(output.scripts.len(), 0);
        assert_eq!(output.analysis_data["analysis_summary"]["hooks_generated"], 0);
    }
}
