//! Similar-profiles adapter (spec §4.2 item 4, feeds C9 network discovery).
//!
//! The upstream API has shipped two response shapes historically: a flat
//! array of profile objects, and a keyed object (`{"users": [...]}` /
//! `{"data": [...]}`). Both are accepted transparently.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::retry::{classify_reqwest_error, classify_status, with_retry};
use super::FetchError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarProfileDescriptor {
    pub username: String,
    pub full_name: Option<String>,
    pub followers: i64,
    pub is_verified: bool,
}

#[async_trait]
pub trait SimilarProfilesFetcher: Send + Sync {
    async fn fetch_similar(&self, username: &str) -> Result<Vec<SimilarProfileDescriptor>, FetchError>;
}

pub struct LiveSimilarProfilesFetcher {
    client: reqwest::Client,
    api_host: String,
    api_key: String,
}

impl LiveSimilarProfilesFetcher {
    pub fn new(api_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client, api_host: api_host.into(), api_key: api_key.into() }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawSimilarProfile {
    #[serde(default)]
    username: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    follower_count: i64,
    #[serde(default)]
    is_verified: bool,
}

/// Accepts a bare array, `{"users": [...]}`, or `{"data": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSimilarResponse {
    Array(Vec<RawSimilarProfile>),
    Users { users: Vec<RawSimilarProfile> },
    Data { data: Vec<RawSimilarProfile> },
}

impl RawSimilarResponse {
    fn into_profiles(self) -> Vec<RawSimilarProfile> {
        match self {
            Self::Array(items) => items,
            Self::Users { users } => users,
            Self::Data { data } => data,
        }
    }
}

#[async_trait]
impl SimilarProfilesFetcher for LiveSimilarProfilesFetcher {
    async fn fetch_similar(&self, username: &str) -> Result<Vec<SimilarProfileDescriptor>, FetchError> {
        with_retry(|| async {
            let url = format!("https://{}/v1/similar", self.api_host);
            let response = self
                .client
                .get(&url)
                .query(&[("username", username)])
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

            let raw: RawSimilarResponse = serde_json::from_str(&body)
                .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;

            Ok(raw
                .into_profiles()
                .into_iter()
                .filter(|p| !p.username.is_empty())
                .map(|p| SimilarProfileDescriptor {
                    username: p.username,
                    full_name: p.full_name,
                    followers: p.follower_count,
                    is_verified: p.is_verified,
                })
                .collect())
        })
        .await
    }
}

pub struct FakeSimilarProfilesFetcher {
    by_username: Mutex<HashMap<String, Vec<SimilarProfileDescriptor>>>,
}

impl FakeSimilarProfilesFetcher {
    pub fn new() -> Self {
        Self { by_username: Mutex::new(HashMap::new()) }
    }

    pub fn seed(&self, username: impl Into<String>, similar: Vec<SimilarProfileDescriptor>) {
        self.by_username.lock().unwrap().insert(username.into(), similar);
    }
}

impl Default for FakeSimilarProfilesFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarProfilesFetcher for FakeSimilarProfilesFetcher {
    async fn fetch_similar(&self, username: &str) -> Result<Vec<SimilarProfileDescriptor>, FetchError> {
        Ok(self.by_username.lock().unwrap().get(username).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_shape() {
        let body = r#"[{"username": "a", "follower_count": 10}]"#;
        let raw: RawSimilarResponse = serde_json::from_str(body).unwrap();
        let profiles = raw.into_profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].username, "a");
    }

    #[test]
    fn parses_users_keyed_shape() {
        let body = r#"{"users": [{"username": "b", "follower_count": 20}]}"#;
        let raw: RawSimilarResponse = serde_json::from_str(body).unwrap();
        let profiles = raw.into_profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].username, "b");
    }

    #[test]
    fn parses_data_keyed_shape() {
        let body = r#"{"data": [{"username": "c", "follower_count": 30}]}"#;
        let raw: RawSimilarResponse = serde_json::from_str(body).unwrap();
        let profiles = raw.into_profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].username, "c");
    }

    #[tokio::test]
    async fn fake_returns_empty_for_unseeded_username() {
        let fetcher = FakeSimilarProfilesFetcher::new();
        let result = fetcher.fetch_similar("nobody").await.unwrap();
        assert!(result.is_empty());
    }
}
