//! Bulk-reels adapter (spec §4.2 item 5): submit up to 100 reel ids for
//! batch detail retrieval, poll until the job finishes, collect results.
//! Used by the viral sub-pipeline's smart transcript selection to avoid
//! one detail call per candidate reel.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::retry::{classify_reqwest_error, classify_status, with_retry};
use super::FetchError;

pub const MAX_BATCH_SIZE: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 30;

#[derive(Debug, Clone, Default)]
pub struct RawReel {
    pub content_id: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub play_count: i64,
    pub caption: Option<String>,
}

#[async_trait]
pub trait BulkReelsFetcher: Send + Sync {
    /// Submits, polls, and collects in one call. `reel_ids.len()` must be
    /// `<= MAX_BATCH_SIZE`; callers chunk larger requests themselves.
    async fn fetch_bulk(&self, reel_ids: &[String]) -> Result<Vec<RawReel>, FetchError>;
}

pub struct LiveBulkReelsFetcher {
    client: reqwest::Client,
    api_host: String,
    api_key: String,
}

impl LiveBulkReelsFetcher {
    pub fn new(api_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client, api_host: api_host.into(), api_key: api_key.into() }
    }

    async fn submit(&self, reel_ids: &[String]) -> Result<String, FetchError> {
        with_retry(|| async {
            let url = format!("https://{}/v1/reels/bulk", self.api_host);
            let response = self
                .client
                .post(&url)
                .header("x-rapidapi-key", &self.api_key)
                .header("x-rapidapi-host", &self.api_host)
                .json(&serde_json::json!({ "ids": reel_ids }))
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status();
            let body = response.text().await.map_err(classify_reqwest_error)?;
            if let Some(err) = classify_status(status, &body) {
                return Err(err);
            }
            let raw: SubmitResponse = serde_json::from_str(&body)
                .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;
            Ok(raw.job_id)
        })
        .await
    }

    async fn poll_once(&self, job_id: &str) -> Result<JobPoll, FetchError> {
        with_retry(|| async {
            let url = format!("https://{}/v1/reels/bulk/{}", self.api_host, job_id);
            let response = self
                .client
                .get(&url)
                .header("x-rapidapi-key", &self.api_key)
                .header("x-rapidapi-host", &self.api_host)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status();
            let body = response.text().await.map_err(classify_reqwest_error)?;
            if let Some(err) = classify_status(status, &body) {
                return Err(err);
            }
            let raw: JobPoll = serde_json::from_str(&body)
                .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;
            Ok(raw)
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "status", rename_all = "snake_case")]
enum JobPoll {
    Pending,
    Running,
    Done { results: Vec<RawReelResponse> },
    Failed { error: String },
}

#[derive(Debug, Deserialize, Clone, Default)]
struct RawReelResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    comment_count: i64,
    #[serde(default)]
    play_count: i64,
    #[serde(default)]
    caption_text: Option<String>,
}

#[async_trait]
impl BulkReelsFetcher for LiveBulkReelsFetcher {
    async fn fetch_bulk(&self, reel_ids: &[String]) -> Result<Vec<RawReel>, FetchError> {
        if reel_ids.len() > MAX_BATCH_SIZE {
            return Err(FetchError::Malformed(format!(
                "batch of {} exceeds max of {MAX_BATCH_SIZE}",
                reel_ids.len()
            )));
        }
        if reel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let job_id = self.submit(reel_ids).await?;
        for _ in 0..MAX_POLLS {
            match self.poll_once(&job_id).await? {
                JobPoll::Done { results } => {
                    return Ok(results
                        .into_iter()
                        .map(|r| RawReel {
                            content_id: r.id,
                            like_count: r.like_count,
                            comment_count: r.comment_count,
                            play_count: r.play_count,
                            caption: r.caption_text,
                        })
                        .collect());
                },
                JobPoll::Failed { error } => return Err(FetchError::Transient(error)),
                JobPoll::Pending | JobPoll::Running => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                },
            }
        }
        Err(FetchError::Transient(format!("bulk job {job_id} did not finish within poll budget")))
    }
}

/// Echoes seeded reels back immediately, no polling.
pub struct FakeBulkReelsFetcher {
    pub reels: Vec<RawReel>,
}

#[async_trait]
impl BulkReelsFetcher for FakeBulkReelsFetcher {
    async fn fetch_bulk(&self, reel_ids: &[String]) -> Result<Vec<RawReel>, FetchError> {
        if reel_ids.len() > MAX_BATCH_SIZE {
            return Err(FetchError::Malformed(format!(
                "batch of {} exceeds max of {MAX_BATCH_SIZE}",
                reel_ids.len()
            )));
        }
        Ok(self.reels.iter().filter(|r| reel_ids.contains(&r.content_id)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_returns_only_requested_ids() {
        let fetcher = FakeBulkReelsFetcher {
            reels: vec![
                RawReel { content_id: "a".into(), like_count: 1, ..Default::default() },
                RawReel { content_id: "b".into(), like_count: 2, ..Default::default() },
            ],
        };
        let result = fetcher.fetch_bulk(&["a".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content_id, "a");
    }

    #[tokio::test]
    async fn rejects_batches_over_max_size() {
        let fetcher = FakeBulkReelsFetcher { reels: Vec::new() };
        let ids: Vec<String> = (0..MAX_BATCH_SIZE + 1).map(|i| i.to_string()).collect();
        let result = fetcher.fetch_bulk(&ids).await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let fetcher = FakeBulkReelsFetcher { reels: Vec::new() };
        let result = fetcher.fetch_bulk(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
