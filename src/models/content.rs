use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Reel,
    Post,
    Story,
}

impl ContentKind {
    pub fn normalize(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "post" => Self::Post,
            "story" => Self::Story,
            _ => Self::Reel,
        }
    }

    pub fn as_storage_str(self) -> &'static str {
        match self {
            Self::Reel => "reel",
            Self::Post => "post",
            Self::Story => "story",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentStyle {
    Video,
    Image,
    CarouselImage,
    CarouselVideo,
}

impl ContentStyle {
    /// Derive `style` from the union of API shapes per spec §4.4.
    ///
    /// `is_carousel` comes from any of `media_type==8`, a `carousel_media`
    /// array, `edge_sidecar_to_children.edges`, or `product_type ==
    /// "carousel_container"`. `has_carousel_video_child` is true iff any
    /// child of the carousel itself looks like a video
    /// (`media_type==2`, `video_versions`, `is_video`/`video_url`).
    pub fn derive(is_carousel: bool, is_video: bool, has_carousel_video_child: bool) -> Self {
        match (is_carousel, has_carousel_video_child, is_video) {
            (true, true, _) => Self::CarouselVideo,
            (true, false, _) => Self::CarouselImage,
            (false, _, true) => Self::Video,
            (false, _, false) => Self::Image,
        }
    }

    pub fn as_storage_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::CarouselImage => "carousel_image",
            Self::CarouselVideo => "carousel_video",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Content {
    pub content_id: String,
    pub shortcode: String,
    pub profile_owner: String,
    #[sqlx(try_from = "String")]
    pub kind: ContentKindColumn,
    #[sqlx(try_from = "String")]
    pub style: ContentStyleColumn,
    pub url: Option<String>,
    pub description: Option<String>,
    pub thumb_key: Option<String>,
    pub display_key: Option<String>,
    /// 0 for posts.
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub date_posted: Option<DateTime<Utc>>,
    pub outlier_score: f64,
    pub primary_category: Option<String>,
    pub secondary_category: Option<String>,
    pub tertiary_category: Option<String>,
    pub keyword1: Option<String>,
    pub keyword2: Option<String>,
    pub keyword3: Option<String>,
    pub keyword4: Option<String>,
    pub confidence: Option<f64>,
    pub transcript: Option<String>,
    pub transcript_language: Option<String>,
    pub transcript_fetched_at: Option<DateTime<Utc>>,
    pub transcript_available: bool,
}

impl Content {
    /// Metric used for outlier scoring: view count for reels, like count
    /// for posts (spec §4.4).
    pub fn outlier_metric(&self) -> i64 {
        match self.kind.0 {
            ContentKind::Post => self.like_count,
            ContentKind::Reel | ContentKind::Story => self.view_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ContentKindColumn(pub ContentKind);

impl TryFrom<String> for ContentKindColumn {
    type Error = std::convert::Infallible;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(ContentKind::normalize(&value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ContentStyleColumn(pub ContentStyle);

impl TryFrom<String> for ContentStyleColumn {
    type Error = std::convert::Infallible;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let style = match value.as_str() {
            "carousel_image" => ContentStyle::CarouselImage,
            "carousel_video" => ContentStyle::CarouselVideo,
            "image" => ContentStyle::Image,
            _ => ContentStyle::Video,
        };
        Ok(Self(style))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carousel_with_video_child_is_carousel_video() {
        assert_eq!(ContentStyle::derive(true, false, true), ContentStyle::CarouselVideo);
    }

    #[test]
    fn carousel_with_only_images_is_carousel_image() {
        assert_eq!(ContentStyle::derive(true, false, false), ContentStyle::CarouselImage);
    }

    #[test]
    fn non_carousel_video_is_video() {
        assert_eq!(ContentStyle::derive(false, true, false), ContentStyle::Video);
    }

    #[test]
    fn outlier_metric_uses_likes_for_posts() {
        let content = test_content(ContentKind::Post, 0, 42);
        assert_eq!(content.outlier_metric(), 42);
    }

    #[test]
    fn outlier_metric_uses_views_for_reels() {
        let content = test_content(ContentKind::Reel, 100, 5);
        assert_eq!(content.outlier_metric(), 100);
    }

    fn test_content(kind: ContentKind, views: i64, likes: i64) -> Content {
        Content {
            content_id: "c1".into(),
            shortcode: "abc123".into(),
            profile_owner: "someone".into(),
            kind: ContentKindColumn(kind),
            style: ContentStyleColumn(ContentStyle::Image),
            url: None,
            description: None,
            thumb_key: None,
            display_key: None,
            view_count: views,
            like_count: likes,
            comment_count: 0,
            date_posted: None,
            outlier_score: 0.0,
            primary_category: None,
            secondary_category: None,
            tertiary_category: None,
            keyword1: None,
            keyword2: None,
            keyword3: None,
            keyword4: None,
            confidence: None,
            transcript: None,
            transcript_language: None,
            transcript_fetched_at: None,
            transcript_available: false,
        }
    }
}
