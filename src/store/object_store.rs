//! Object store (`UploadImage`/`PublicURL`, spec §4.1), backed by Supabase
//! Storage's REST API in production. A fixed-key fake backs tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::utils::ApiError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, ApiError>;
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

pub struct LiveObjectStore {
    client: reqwest::Client,
    supabase_url: String,
    service_role_key: String,
}

impl LiveObjectStore {
    pub fn new(supabase_url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client, supabase_url: supabase_url.into(), service_role_key: service_role_key.into() }
    }
}

#[async_trait]
impl ObjectStore for LiveObjectStore {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.supabase_url, bucket, key);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_role_key)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ApiError::internal_error(format!("object upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::internal_error(format!("object upload returned {status}: {body}")));
        }
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.supabase_url, bucket, key)
    }
}

/// In-memory fake; records every uploaded key so tests can assert on it.
pub struct FakeObjectStore {
    uploaded: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self { uploaded: Mutex::new(HashMap::new()) }
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.uploaded.lock().unwrap().contains_key(&format!("{bucket}/{key}"))
    }
}

impl Default for FakeObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        self.uploaded.lock().unwrap().insert(format!("{bucket}/{key}"), bytes);
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("fake://{bucket}/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_records_uploads() {
        let store = FakeObjectStore::new();
        store.upload("images", "user/a_display.jpg", vec![1, 2, 3]).await.unwrap();
        assert!(store.contains("images", "user/a_display.jpg"));
    }

    #[test]
    fn fake_public_url_is_deterministic() {
        let store = FakeObjectStore::new();
        assert_eq!(store.public_url("images", "k"), "fake://images/k");
    }
}
