//! Fetch-pipeline (C4, spec §4.4): per-username orchestration of profile,
//! listing, detail, image, categorisation, metrics, and dual-write, built
//! on C1-C3.

pub mod detail_batch;
pub mod images;
pub mod metrics;
pub mod style;

use std::sync::Arc;

use serde::Deserialize;

use crate::categoriser;
use crate::fetchers::detail::MediaDetail;
use crate::fetchers::listing::ListingKind;
use crate::fetchers::{
    BulkReelsFetcher, DetailFetcher, ListingFetcher, LlmChatFetcher, ProfileFetcher, SimilarProfilesFetcher,
};
use crate::models::{
    AccountTypeColumn, Content, ContentKind, ContentKindColumn, ContentStyleColumn, PrimaryProfile,
    SecondaryProfile,
};
use crate::store::Store;
use crate::utils::{ApiResult, StringExt};

/// Hard cap on pagination pages, independent of the target item count
/// (spec §4.4).
pub const HARD_PAGE_CAP: u32 = 20;
const HIGH_PRIORITY_REEL_COUNT: usize = 12;
const HIGH_PRIORITY_SIMILAR_COUNT: usize = 20;
const LOW_PRIORITY_BATCH_SIZE: usize = 20;

#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<Store>,
    pub http: reqwest::Client,
    pub profile_fetcher: Arc<dyn ProfileFetcher>,
    pub listing_fetcher: Arc<dyn ListingFetcher>,
    pub detail_fetcher: Arc<dyn DetailFetcher>,
    pub similar_fetcher: Arc<dyn SimilarProfilesFetcher>,
    pub bulk_reels_fetcher: Arc<dyn BulkReelsFetcher>,
    pub llm: Arc<dyn LlmChatFetcher>,
}

/// The subset of a listing-item's shape the pipeline needs; adapters
/// return the rest as opaque `serde_json::Value` for the detail stage.
#[derive(Debug, Deserialize)]
struct ListingItemRef {
    id: String,
    #[serde(default)]
    code: Option<String>,
}

/// Up to 5 non-empty captions, for `classify_profile`'s recent-captions
/// signal (spec §4.3).
fn recent_captions(content: &[Content]) -> Vec<String> {
    content.iter().filter_map(|c| c.description.clone()).filter(|d| !d.is_empty()).take(5).collect()
}

impl Pipeline {
    fn listing_item_ids(items: &[serde_json::Value]) -> Vec<ListingItemRef> {
        items.iter().filter_map(|v| serde_json::from_value(v.clone()).ok()).collect()
    }

    async fn build_content_from_detail(
        &self,
        owner: &str,
        kind: ContentKind,
        item: &ListingItemRef,
        detail: &MediaDetail,
        median_placeholder: f64,
    ) -> Content {
        let style = style::derive_style(detail);
        let shortcode = item.code.clone().unwrap_or_else(|| item.id.clone());
        let image_key = images::acquire_image(
            &self.http,
            &self.store,
            owner,
            &shortcode,
            "display",
            detail.image_url.as_deref(),
        )
        .await;

        let classification =
            categoriser::classify_content(self.llm.as_ref(), detail.caption.as_deref().unwrap_or(""), "").await;

        let outlier_value = match kind {
            ContentKind::Post => detail.like_count,
            ContentKind::Reel | ContentKind::Story => detail.view_count.max(detail.play_count),
        };

        Content {
            content_id: detail.content_id.clone(),
            shortcode,
            profile_owner: owner.normalized_username(),
            kind: ContentKindColumn(kind),
            style: ContentStyleColumn(style),
            url: None,
            description: detail.caption.clone(),
            thumb_key: None,
            display_key: image_key,
            view_count: if matches!(kind, ContentKind::Post) { 0 } else { detail.view_count.max(detail.play_count) },
            like_count: detail.like_count,
            comment_count: detail.comment_count,
            date_posted: None,
            outlier_score: metrics::outlier_score(outlier_value, median_placeholder),
            primary_category: Some(classification.classification.primary),
            secondary_category: Some(classification.classification.secondary),
            tertiary_category: Some(classification.classification.tertiary),
            keyword1: classification.keywords.first().cloned(),
            keyword2: classification.keywords.get(1).cloned(),
            keyword3: classification.keywords.get(2).cloned(),
            keyword4: classification.keywords.get(3).cloned(),
            confidence: Some(classification.classification.confidence),
            transcript: None,
            transcript_language: None,
            transcript_fetched_at: None,
            transcript_available: false,
        }
    }

    /// Fetches `target_count` items of `kind` (capped at [`HARD_PAGE_CAP`]
    /// pagination pages) and their details, recomputing `outlierScore`
    /// against the batch's own median once all details are in.
    async fn fetch_content_batch(
        &self,
        username: &str,
        kind: ContentKind,
        target_count: usize,
    ) -> ApiResult<Vec<Content>> {
        let listing_kind = match kind {
            ContentKind::Post => ListingKind::Posts,
            _ => ListingKind::Reels,
        };
        let page = self
            .listing_fetcher
            .fetch(username, listing_kind, target_count, Some(HARD_PAGE_CAP))
            .await
            .map_err(|e| crate::utils::ApiError::internal_error(format!("listing fetch failed: {e}")))?;

        let all_refs = Self::listing_item_ids(&page.items);
        let existing_shortcodes = self.store.shortcodes_for_owner(username).await?;
        let refs: Vec<ListingItemRef> = all_refs
            .into_iter()
            .filter(|r| {
                let shortcode = r.code.as_deref().unwrap_or(&r.id);
                !existing_shortcodes.contains(shortcode)
            })
            .collect();
        let ids: Vec<String> = refs.iter().map(|r| r.id.clone()).collect();
        let detail_results = detail_batch::fetch_details_adaptive(self.detail_fetcher.as_ref(), &ids).await;

        let mut details_by_id = std::collections::HashMap::new();
        for (id, result) in detail_results {
            if let Ok(detail) = result {
                details_by_id.insert(id, detail);
            }
        }

        let raw_values: Vec<i64> = refs
            .iter()
            .filter_map(|r| details_by_id.get(&r.id))
            .map(|d| match kind {
                ContentKind::Post => d.like_count,
                _ => d.view_count.max(d.play_count),
            })
            .collect();
        let agg = metrics::compute_agg_metrics(&raw_values, &[], &[]);

        let mut out = Vec::new();
        for item in &refs {
            if let Some(detail) = details_by_id.get(&item.id) {
                out.push(self.build_content_from_detail(username, kind, item, detail, agg.median_views).await);
            }
        }
        Ok(out)
    }

    async fn persist_and_verify(
        &self,
        profile: &PrimaryProfile,
        content: &[Content],
        expected_secondary: usize,
    ) -> ApiResult<()> {
        self.store.upsert_primary(profile).await?;
        let saved_content = self.store.save_content_batch(content).await?;

        let Some(owner_id) = self.store.primary_id_for_username(&profile.username).await? else {
            return Err(crate::utils::ApiError::internal_error("primary profile missing after upsert"));
        };

        let report = self
            .store
            .verify_integrity(owner_id, &profile.username, content.len(), expected_secondary)
            .await?;
        if !report.success {
            tracing::warn!(username = %profile.username, errors = ?report.errors, "verify_integrity failed, rolling back");
            self.store.rollback(owner_id, &profile.username).await?;
        } else if !report.warnings.is_empty() {
            tracing::warn!(username = %profile.username, warnings = ?report.warnings, saved_content, "partial save");
        }
        Ok(())
    }

    async fn process_similar_profiles(&self, username: &str, take: usize) -> ApiResult<Vec<String>> {
        let similar = self
            .similar_fetcher
            .fetch_similar(username)
            .await
            .map_err(|e| crate::utils::ApiError::internal_error(format!("similar-profiles fetch failed: {e}")))?;

        let mut usernames = Vec::new();
        let mut secondary_rows = Vec::new();
        for (rank, descriptor) in similar.into_iter().take(take).enumerate() {
            usernames.push(descriptor.username.clone());
            let account_type =
                categoriser::classify_account_type(self.llm.as_ref(), &descriptor.username, "", 0).await;
            let classification =
                categoriser::classify_profile(self.llm.as_ref(), &descriptor.username, "", &[]).await;
            secondary_rows.push(SecondaryProfile {
                id: 0,
                username: descriptor.username,
                full_name: descriptor.full_name,
                bio: None,
                followers: descriptor.followers,
                following: 0,
                media_count: 0,
                image_key: None,
                is_verified: descriptor.is_verified,
                account_type: AccountTypeColumn::from(account_type),
                primary_category: Some(classification.primary),
                secondary_category: Some(classification.secondary),
                tertiary_category: Some(classification.tertiary),
                discovered_by: 0,
                similarity_rank: rank as i32,
            });
        }
        if let Some(owner_id) = self.store.primary_id_for_username(username).await? {
            self.store.upsert_secondary_batch(&secondary_rows, owner_id).await?;
        }
        Ok(usernames)
    }

    /// Categorises via the LLM (spec §4.3 categoriser contract; ground
    /// truth `original_source/PrimaryProfileFetch.py:1498`'s
    /// `ai_categorize_profile_type`), rather than deriving `accountType`
    /// from the raw API flag and leaving categories permanently null.
    async fn profile_from_external(
        &self,
        external: &crate::fetchers::ExternalProfile,
        agg: &crate::models::AggMetrics,
        recent_captions: &[String],
    ) -> PrimaryProfile {
        let bio = external.bio.as_deref().unwrap_or("");
        let account_type =
            categoriser::classify_account_type(self.llm.as_ref(), &external.username, bio, external.posts_count).await;
        let classification = categoriser::classify_profile(self.llm.as_ref(), &external.username, bio, recent_captions).await;
        PrimaryProfile {
            username: external.username.normalized_username(),
            display_name: external.display_name.clone(),
            bio: external.bio.clone(),
            followers: external.followers,
            posts_count: external.posts_count,
            is_verified: external.is_verified,
            account_type: AccountTypeColumn::from(account_type),
            image_key: external.avatar_url.clone(),
            primary_category: Some(classification.primary),
            secondary_category: Some(classification.secondary),
            tertiary_category: Some(classification.tertiary),
            total_reels: agg.total_reels,
            median_views: agg.median_views,
            mean_views: agg.mean_views,
            std_views: agg.std_views,
            total_views: agg.total_views,
            total_likes: agg.total_likes,
            total_comments: agg.total_comments,
            similar: Vec::new(),
            last_full_scrape: Some(chrono::Utc::now()),
            analysis_timestamp: Some(chrono::Utc::now()),
        }
    }

    /// HIGH-priority path (spec §4.4): profile, page-1 reels, and similar
    /// profiles all run concurrently.
    pub async fn run_complete(&self, username: &str) -> ApiResult<Vec<Content>> {
        let (profile_result, content_result, similar_result) = tokio::join!(
            self.profile_fetcher.fetch_profile(username),
            self.fetch_content_batch(username, ContentKind::Reel, HIGH_PRIORITY_REEL_COUNT),
            self.process_similar_profiles(username, HIGH_PRIORITY_SIMILAR_COUNT),
        );

        let external = profile_result
            .map_err(|e| crate::utils::ApiError::internal_error(format!("profile fetch failed: {e}")))?;
        let content = content_result?;
        let similar_usernames = similar_result.unwrap_or_default();

        let raw_views: Vec<i64> = content.iter().map(|c| c.view_count.max(c.like_count)).collect();
        let agg = metrics::compute_agg_metrics(
            &raw_views,
            &content.iter().map(|c| c.like_count).collect::<Vec<_>>(),
            &content.iter().map(|c| c.comment_count).collect::<Vec<_>>(),
        );
        let mut profile = self.profile_from_external(&external, &agg, &recent_captions(&content)).await;
        profile.similar = similar_usernames.clone();

        self.persist_and_verify(&profile, &content, similar_usernames.len()).await?;
        Ok(content)
    }

    /// LOW-priority bulk path (spec §4.4): profile and bulk-reels run
    /// concurrently with similar-profile processing; reels are
    /// categorised in batches of 20.
    pub async fn run_low_priority(&self, username: &str) -> ApiResult<Vec<Content>> {
        let page = self
            .listing_fetcher
            .fetch(username, ListingKind::Reels, 100, None)
            .await
            .map_err(|e| crate::utils::ApiError::internal_error(format!("listing fetch failed: {e}")))?;
        let refs = Self::listing_item_ids(&page.items);
        let reel_ids: Vec<String> = refs.iter().map(|r| r.id.clone()).collect();

        let (profile_result, bulk_result, _similar) = tokio::join!(
            self.profile_fetcher.fetch_profile(username),
            self.bulk_reels_fetcher.fetch_bulk(&reel_ids),
            self.process_similar_profiles(username, HIGH_PRIORITY_SIMILAR_COUNT),
        );

        let external = profile_result
            .map_err(|e| crate::utils::ApiError::internal_error(format!("profile fetch failed: {e}")))?;
        let raw_reels = bulk_result
            .map_err(|e| crate::utils::ApiError::internal_error(format!("bulk reels fetch failed: {e}")))?;

        let mut content = Vec::new();
        for chunk in raw_reels.chunks(LOW_PRIORITY_BATCH_SIZE) {
            let classified = futures::future::join_all(chunk.iter().map(|reel| async move {
                let classification =
                    categoriser::classify_content(self.llm.as_ref(), reel.caption.as_deref().unwrap_or(""), "").await;
                (reel, classification)
            }))
            .await;

            for (reel, classification) in classified {
                content.push(Content {
                    content_id: reel.content_id.clone(),
                    shortcode: reel.content_id.clone(),
                    profile_owner: username.normalized_username(),
                    kind: ContentKindColumn(ContentKind::Reel),
                    style: ContentStyleColumn(crate::models::ContentStyle::Video),
                    url: None,
                    description: reel.caption.clone(),
                    thumb_key: None,
                    display_key: None,
                    view_count: reel.play_count,
                    like_count: reel.like_count,
                    comment_count: reel.comment_count,
                    date_posted: None,
                    outlier_score: 0.0,
                    primary_category: Some(classification.classification.primary),
                    secondary_category: Some(classification.classification.secondary),
                    tertiary_category: Some(classification.classification.tertiary),
                    keyword1: classification.keywords.first().cloned(),
                    keyword2: classification.keywords.get(1).cloned(),
                    keyword3: classification.keywords.get(2).cloned(),
                    keyword4: classification.keywords.get(3).cloned(),
                    confidence: Some(classification.classification.confidence),
                    transcript: None,
                    transcript_language: None,
                    transcript_fetched_at: None,
                    transcript_available: false,
                });
            }
        }

        let views: Vec<i64> = content.iter().map(|c| c.view_count).collect();
        let agg = metrics::compute_agg_metrics(
            &views,
            &content.iter().map(|c| c.like_count).collect::<Vec<_>>(),
            &content.iter().map(|c| c.comment_count).collect::<Vec<_>>(),
        );
        for item in &mut content {
            item.outlier_score = metrics::outlier_score(item.view_count, agg.median_views);
        }

        let profile = self.profile_from_external(&external, &agg, &recent_captions(&content)).await;
        self.persist_and_verify(&profile, &content, 0).await?;
        Ok(content)
    }

    /// Shared by the three viral `RunX` variants: fetch profile and content
    /// concurrently, persist both (no similar-profiles processing), return
    /// the fetched content for reel selection.
    async fn run_viral_variant(&self, username: &str, kind: ContentKind, max_items: usize) -> ApiResult<Vec<Content>> {
        let (profile_result, content_result) =
            tokio::join!(self.profile_fetcher.fetch_profile(username), self.fetch_content_batch(username, kind, max_items));

        let external = profile_result
            .map_err(|e| crate::utils::ApiError::internal_error(format!("profile fetch failed: {e}")))?;
        let content = content_result?;

        let raw_values: Vec<i64> = content.iter().map(|c| c.outlier_metric()).collect();
        let agg = metrics::compute_agg_metrics(
            &raw_values,
            &content.iter().map(|c| c.like_count).collect::<Vec<_>>(),
            &content.iter().map(|c| c.comment_count).collect::<Vec<_>>(),
        );
        let profile = self.profile_from_external(&external, &agg, &recent_captions(&content)).await;
        self.persist_and_verify(&profile, &content, 0).await?;
        Ok(content)
    }

    /// Used by C7 for a new primary or competitor; skips similar-profiles
    /// entirely for speed.
    pub async fn run_viral_initial(&self, username: &str, max_reels: usize) -> ApiResult<Vec<Content>> {
        self.run_viral_variant(username, ContentKind::Reel, max_reels).await
    }

    /// 24h refresh variant; same shape, smaller batch.
    pub async fn run_viral_refresh(&self, username: &str, max_reels: usize) -> ApiResult<Vec<Content>> {
        self.run_viral_variant(username, ContentKind::Reel, max_reels).await
    }

    /// Posts-only variant; `outlierScore` is computed from like counts.
    pub async fn run_posts_only(&self, username: &str, max_posts: usize) -> ApiResult<Vec<Content>> {
        self.run_viral_variant(username, ContentKind::Post, max_posts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_item_ids_parses_id_and_code() {
        let items = vec![serde_json::json!({"id": "1", "code": "abc"}), serde_json::json!({"id": "2"})];
        let refs = Pipeline::listing_item_ids(&items);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].code.as_deref(), Some("abc"));
        assert_eq!(refs[1].code, None);
    }
}
