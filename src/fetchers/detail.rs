//! Media detail adapter (spec §4.2 item 3): single-content metrics plus
//! carousel-shape signals and the best-available image candidate.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::retry::{classify_reqwest_error, classify_status, with_retry};
use super::FetchError;

#[derive(Debug, Clone, Default)]
pub struct CarouselChild {
    pub media_type_raw: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaDetail {
    pub content_id: String,
    pub caption: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub play_count: i64,
    pub product_type_raw: String,
    pub media_type_raw: String,
    pub carousel_children: Vec<CarouselChild>,
    /// `edge_sidecar_to_children.edges` count, the Instagram GraphQL-shape
    /// carousel signal some upstream responses carry alongside (or instead
    /// of) `carousel_media` (spec §4.4).
    pub edge_sidecar_children_count: usize,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch_detail(&self, content_id: &str) -> Result<MediaDetail, FetchError>;
}

pub struct LiveDetailFetcher {
    client: reqwest::Client,
    api_host: String,
    api_key: String,
}

impl LiveDetailFetcher {
    pub fn new(api_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client, api_host: api_host.into(), api_key: api_key.into() }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawImageCandidate {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawImageVersions2 {
    #[serde(default)]
    candidates: Vec<RawImageCandidate>,
}

#[derive(Debug, Deserialize, Default)]
struct RawVideoVersion {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawCarouselChild {
    #[serde(default)]
    media_type: i32,
    #[serde(default)]
    image_versions2: RawImageVersions2,
}

#[derive(Debug, Deserialize, Default)]
struct RawEdgeSidecarEdge {}

#[derive(Debug, Deserialize, Default)]
struct RawEdgeSidecarToChildren {
    #[serde(default)]
    edges: Vec<RawEdgeSidecarEdge>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMediaResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    caption_text: Option<String>,
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    comment_count: i64,
    #[serde(default)]
    view_count: i64,
    #[serde(default)]
    play_count: i64,
    #[serde(default)]
    product_type: String,
    #[serde(default)]
    media_type: i32,
    #[serde(default)]
    display_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    image_versions2: RawImageVersions2,
    #[serde(default)]
    video_versions: Vec<RawVideoVersion>,
    #[serde(default)]
    carousel_media: Vec<RawCarouselChild>,
    #[serde(default)]
    edge_sidecar_to_children: RawEdgeSidecarToChildren,
}

/// Preference order: display image, then thumbnail, then the first
/// `image_versions2` candidate, then the first video-version thumbnail.
fn best_image_url(raw: &RawMediaResponse) -> Option<String> {
    raw.display_url
        .clone()
        .or_else(|| raw.thumbnail_url.clone())
        .or_else(|| raw.image_versions2.candidates.first().and_then(|c| c.url.clone()))
        .or_else(|| raw.video_versions.first().and_then(|v| v.url.clone()))
}

fn media_type_label(media_type: i32) -> String {
    match media_type {
        1 => "image".to_string(),
        2 => "video".to_string(),
        8 => "carousel".to_string(),
        other => format!("unknown({other})"),
    }
}

#[async_trait]
impl DetailFetcher for LiveDetailFetcher {
    async fn fetch_detail(&self, content_id: &str) -> Result<MediaDetail, FetchError> {
        with_retry(|| async {
            let url = format!("https://{}/v1/media/detail", self.api_host);
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

            let raw: RawMediaResponse = serde_json::from_str(&body)
                .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;

            let image_url = best_image_url(&raw);
            let children = raw
                .carousel_media
                .iter()
                .map(|c| CarouselChild {
                    media_type_raw: media_type_label(c.media_type),
                    image_url: c.image_versions2.candidates.first().and_then(|cand| cand.url.clone()),
                })
                .collect();

            Ok(MediaDetail {
                content_id: if raw.id.is_empty() { content_id.to_string() } else { raw.id.clone() },
                caption: raw.caption_text.clone(),
                like_count: raw.like_count,
                comment_count: raw.comment_count,
                view_count: raw.view_count,
                play_count: raw.play_count,
                product_type_raw: raw.product_type.clone(),
                media_type_raw: media_type_label(raw.media_type),
                carousel_children: children,
                edge_sidecar_children_count: raw.edge_sidecar_to_children.edges.len(),
                image_url,
            })
        })
        .await
    }
}

pub struct FakeDetailFetcher {
    details: Mutex<HashMap<String, MediaDetail>>,
}

impl FakeDetailFetcher {
    pub fn new() -> Self {
        Self { details: Mutex::new(HashMap::new()) }
    }

    pub fn seed(&self, detail: MediaDetail) {
        self.details.lock().unwrap().insert(detail.content_id.clone(), detail);
    }
}

impl Default for FakeDetailFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DetailFetcher for FakeDetailFetcher {
    async fn fetch_detail(&self, content_id: &str) -> Result<MediaDetail, FetchError> {
        self.details.lock().unwrap().get(content_id).cloned().ok_or(FetchError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_display_url_over_thumbnail() {
        let raw = RawMediaResponse {
            display_url: Some("display.jpg".into()),
            thumbnail_url: Some("thumb.jpg".into()),
            ..Default::default()
        };
        assert_eq!(best_image_url(&raw), Some("display.jpg".to_string()));
    }

    #[test]
    fn falls_back_to_thumbnail_when_no_display_url() {
        let raw = RawMediaResponse { thumbnail_url: Some("thumb.jpg".into()), ..Default::default() };
        assert_eq!(best_image_url(&raw), Some("thumb.jpg".to_string()));
    }

    #[test]
    fn falls_back_to_image_versions2_candidate() {
        let raw = RawMediaResponse {
            image_versions2: RawImageVersions2 {
                candidates: vec![RawImageCandidate { url: Some("candidate.jpg".into()) }],
            },
            ..Default::default()
        };
        assert_eq!(best_image_url(&raw), Some("candidate.jpg".to_string()));
    }

    #[test]
    fn falls_back_to_video_thumbnail_as_last_resort() {
        let raw = RawMediaResponse {
            video_versions: vec![RawVideoVersion { url: Some("video-thumb.jpg".into()) }],
            ..Default::default()
        };
        assert_eq!(best_image_url(&raw), Some("video-thumb.jpg".to_string()));
    }

    #[tokio::test]
    async fn fake_returns_not_found_for_unknown_id() {
        let fetcher = FakeDetailFetcher::new();
        let result = fetcher.fetch_detail("missing").await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }
}
