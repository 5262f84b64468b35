//! Transcript adapter (spec §4.2 item 6, feeds smart transcript selection
//! in C8). Retries with its own 2s/4s/8s backoff schedule rather than the
//! shared [`super::retry::with_retry`] policy, and exhaustion is a *soft*
//! failure: callers skip the candidate reel and move on to the next one
//! instead of failing the whole run.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::retry::{classify_reqwest_error, classify_status};
use super::FetchError;

const BACKOFF_SCHEDULE_SECS: [u64; 3] = [2, 4, 8];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub language: String,
    pub available_languages: Vec<String>,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn full_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// A single, non-retried attempt. Callers needing the soft-failure
    /// retry schedule should use [`fetch_with_soft_failure`].
    async fn fetch_transcript(&self, content_id: &str) -> Result<Transcript, FetchError>;
}

/// Retries up to the 2/4/8s schedule, then returns `Ok(None)` instead of
/// propagating the error, so a caller collecting transcripts for several
/// candidate reels can keep going past one that never transcribes.
pub async fn fetch_with_soft_failure(
    fetcher: &dyn TranscriptFetcher,
    content_id: &str,
) -> Result<Option<Transcript>, FetchError> {
    for (attempt, delay_secs) in BACKOFF_SCHEDULE_SECS.iter().enumerate() {
        match fetcher.fetch_transcript(content_id).await {
            Ok(transcript) => return Ok(Some(transcript)),
            Err(err) if err.is_retryable() => {
                tracing::warn!(content_id, attempt, error = %err, "transcript fetch failed, retrying");
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            },
            Err(FetchError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        }
    }
    tracing::warn!(content_id, "transcript unavailable after retry schedule, skipping candidate");
    Ok(None)
}

pub struct LiveTranscriptFetcher {
    client: reqwest::Client,
    api_host: String,
    api_key: String,
}

impl LiveTranscriptFetcher {
    pub fn new(api_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client, api_host: api_host.into(), api_key: api_key.into() }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawSegment {
    #[serde(default)]
    start_ms: i64,
    #[serde(default)]
    end_ms: i64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawTranscriptResponse {
    #[serde(default)]
    language: String,
    #[serde(default)]
    available_languages: Vec<String>,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

#[async_trait]
impl TranscriptFetcher for LiveTranscriptFetcher {
    async fn fetch_transcript(&self, content_id: &str) -> Result<Transcript, FetchError> {
        let url = format!("https://{}/v1/media/transcript", self.api_host);
        let response = self
            .client
            .get(&url)
            .query(&[("id", content_id)])
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

        let raw: RawTranscriptResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;

        Ok(Transcript {
            language: raw.language,
            available_languages: raw.available_languages,
            segments: raw
                .segments
                .into_iter()
                .map(|s| TranscriptSegment { start_ms: s.start_ms, end_ms: s.end_ms, text: s.text })
                .collect(),
        })
    }
}

pub struct FakeTranscriptFetcher {
    transcripts: Mutex<HashMap<String, Result<Transcript, FetchError>>>,
}

impl FakeTranscriptFetcher {
    pub fn new() -> Self {
        Self { transcripts: Mutex::new(HashMap::new()) }
    }

    pub fn seed(&self, content_id: impl Into<String>, transcript: Transcript) {
        self.transcripts.lock().unwrap().insert(content_id.into(), Ok(transcript));
    }

    pub fn seed_error(&self, content_id: impl Into<String>, err: FetchError) {
        self.transcripts.lock().unwrap().insert(content_id.into(), Err(err));
    }
}

impl Default for FakeTranscriptFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptFetcher for FakeTranscriptFetcher {
    async fn fetch_transcript(&self, content_id: &str) -> Result<Transcript, FetchError> {
        match self.transcripts.lock().unwrap().get(content_id) {
            Some(Ok(t)) => Ok(t.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn soft_failure_returns_none_for_not_found() {
        let fetcher = FakeTranscriptFetcher::new();
        let result = fetch_with_soft_failure(&fetcher, "missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn soft_failure_returns_some_on_success() {
        let fetcher = FakeTranscriptFetcher::new();
        fetcher.seed(
            "r1",
            Transcript {
                language: "en".into(),
                segments: vec![TranscriptSegment { start_ms: 0, end_ms: 500, text: "hi".into() }],
                ..Default::default()
            },
        );
        let result = fetch_with_soft_failure(&fetcher, "r1").await.unwrap().unwrap();
        assert_eq!(result.full_text(), "hi");
    }

    #[tokio::test]
    async fn soft_failure_swallows_exhausted_transient_errors() {
        let fetcher = FakeTranscriptFetcher::new();
        fetcher.seed_error("flaky", FetchError::Transient("upstream hiccup".into()));
        let result = fetch_with_soft_failure(&fetcher, "flaky").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn soft_failure_propagates_non_retryable_non_not_found_errors() {
        let fetcher = FakeTranscriptFetcher::new();
        fetcher.seed_error("bad", FetchError::Malformed("garbage".into()));
        let result = fetch_with_soft_failure(&fetcher, "bad").await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }
}
