use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::retry::{classify_reqwest_error, classify_status, with_retry};
use super::FetchError;

#[derive(Debug, Clone, Default)]
pub struct ExternalProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub followers: i64,
    pub posts_count: i64,
    pub is_verified: bool,
    /// Raw account-type signal from the API, fed through
    /// `AccountType::normalize` by the pipeline, not here.
    pub account_type_raw: String,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> Result<ExternalProfile, FetchError>;
}

pub struct LiveProfileFetcher {
    client: reqwest::Client,
    api_host: String,
    api_key: String,
}

impl LiveProfileFetcher {
    pub fn new(api_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client, api_host: api_host.into(), api_key: api_key.into() }
    }
}

#[derive(Debug, Deserialize)]
struct RawProfileResponse {
    #[serde(default)]
    username: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    biography: Option<String>,
    #[serde(default)]
    follower_count: i64,
    #[serde(default)]
    media_count: i64,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    is_business: bool,
    #[serde(default)]
    profile_pic_url_hd: Option<String>,
    #[serde(default)]
    profile_pic_url: Option<String>,
}

#[async_trait]
impl ProfileFetcher for LiveProfileFetcher {
    async fn fetch_profile(&self, username: &str) -> Result<ExternalProfile, FetchError> {
        with_retry(|| async {
            let url = format!("https://{}/v1/info", self.api_host);
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

            let raw: RawProfileResponse = serde_json::from_str(&body)
                .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;

            Ok(ExternalProfile {
                username: if raw.username.is_empty() { username.to_string() } else { raw.username },
                display_name: raw.full_name,
                bio: raw.biography,
                followers: raw.follower_count,
                posts_count: raw.media_count,
                is_verified: raw.is_verified,
                account_type_raw: if raw.is_business { "Business Page".to_string() } else { "Personal".to_string() },
                avatar_url: raw.profile_pic_url_hd.or(raw.profile_pic_url),
            })
        })
        .await
    }
}

/// In-memory fake for tests; returns a canned profile per username, or
/// `NotFound` when absent.
pub struct FakeProfileFetcher {
    profiles: Mutex<HashMap<String, ExternalProfile>>,
}

impl FakeProfileFetcher {
    pub fn new() -> Self {
        Self { profiles: Mutex::new(HashMap::new()) }
    }

    pub fn seed(&self, profile: ExternalProfile) {
        self.profiles.lock().unwrap().insert(profile.username.clone(), profile);
    }
}

impl Default for FakeProfileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileFetcher for FakeProfileFetcher {
    async fn fetch_profile(&self, username: &str) -> Result<ExternalProfile, FetchError> {
        self.profiles.lock().unwrap().get(username).cloned().ok_or(FetchError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_returns_seeded_profile() {
        let fetcher = FakeProfileFetcher::new();
        fetcher.seed(ExternalProfile { username: "mindset.therapy".into(), followers: 1000, ..Default::default() });
        let profile = fetcher.fetch_profile("mindset.therapy").await.unwrap();
        assert_eq!(profile.followers, 1000);
    }

    #[tokio::test]
    async fn fake_returns_not_found_for_unknown_username() {
        let fetcher = FakeProfileFetcher::new();
        let result = fetcher.fetch_profile("nobody").await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }
}
