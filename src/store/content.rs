//! `SaveContentBatch` conflict policy and allow-listed batch upsert
//! (spec §4.1).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use crate::models::Content;
use crate::utils::{ApiResult, StringExt};

use super::Store;

/// Filters accepted by `/api/reels` and `/api/posts` (spec §6). Every field
/// is optional; an empty filter returns everything, newest outlier first.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub search: Option<String>,
    pub owner_username: Option<String>,
    pub content_kind: Option<String>,
    pub primary_categories: Vec<String>,
    pub secondary_categories: Vec<String>,
    pub tertiary_categories: Vec<String>,
    pub keywords: Vec<String>,
    pub min_outlier_score: Option<f64>,
    pub max_outlier_score: Option<f64>,
    pub min_views: Option<i64>,
    pub max_views: Option<i64>,
    pub min_likes: Option<i64>,
    pub max_likes: Option<i64>,
    pub min_comments: Option<i64>,
    pub max_comments: Option<i64>,
    pub posted_after: Option<DateTime<Utc>>,
    pub content_styles: Vec<String>,
    pub excluded_usernames: Vec<String>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    pub is_verified: Option<bool>,
    pub random_order: bool,
    pub sort_by: ContentSort,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentSort {
    #[default]
    Popular,
    Views,
    Likes,
    Comments,
    Recent,
    Oldest,
}

impl ContentSort {
    fn order_by_sql(self) -> &'static str {
        match self {
            Self::Popular => "outlier_score DESC NULLS LAST",
            Self::Views => "view_count DESC",
            Self::Likes => "like_count DESC",
            Self::Comments => "comment_count DESC",
            Self::Recent => "date_posted DESC NULLS LAST",
            Self::Oldest => "date_posted ASC NULLS LAST",
        }
    }
}

/// Minimum-acceptance threshold for a partial-save warning: at least
/// `max(1, 10% of expected)` rows must land before we merely warn instead
/// of treating the batch as failed (spec §4.1).
pub fn min_acceptance_threshold(expected: usize) -> usize {
    std::cmp::max(1, expected / 10)
}

impl Store {
    /// Dedupe by `shortcode` and by `content_id` (keep first), skip any
    /// item whose `shortcode` already exists with a *different*
    /// `content_id`, then batch-upsert; on batch failure fall back to
    /// per-row upserts and count successes. Returns the number saved.
    pub async fn save_content_batch(&self, items: &[Content]) -> ApiResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let deduped = self.dedupe_and_filter(items).await?;
        if deduped.is_empty() {
            return Ok(0);
        }

        match self.upsert_content_batch(&deduped).await {
            Ok(()) => Ok(deduped.len()),
            Err(batch_err) => {
                tracing::warn!(error = %batch_err, "content batch upsert failed, falling back to per-row");
                let mut saved = 0;
                for item in &deduped {
                    if self.upsert_content_batch(std::slice::from_ref(item)).await.is_ok() {
                        saved += 1;
                    }
                }
                Ok(saved)
            },
        }
    }

    async fn dedupe_and_filter(&self, items: &[Content]) -> ApiResult<Vec<Content>> {
        let shortcodes: Vec<String> = items.iter().map(|c| c.shortcode.clone()).collect();
        let existing: Vec<(String, String)> = sqlx::query_as(
            "SELECT shortcode, content_id FROM contents WHERE shortcode = ANY($1)",
        )
        .bind(&shortcodes)
        .fetch_all(&self.pool)
        .await?;
        let existing: HashMap<String, String> = existing.into_iter().collect();

        let mut seen_shortcodes = HashSet::new();
        let mut seen_content_ids = HashSet::new();
        let mut out = Vec::new();

        for item in items {
            if let Some(existing_id) = existing.get(&item.shortcode) {
                if existing_id != &item.content_id {
                    continue;
                }
            }
            if !seen_shortcodes.insert(item.shortcode.clone()) {
                continue;
            }
            if !seen_content_ids.insert(item.content_id.clone()) {
                continue;
            }
            out.push(item.clone());
        }
        Ok(out)
    }

    async fn upsert_content_batch(&self, items: &[Content]) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO contents (
                    content_id, shortcode, profile_owner, kind, style, url, description,
                    thumb_key, display_key, view_count, like_count, comment_count,
                    date_posted, outlier_score, primary_category, secondary_category,
                    tertiary_category, keyword1, keyword2, keyword3, keyword4, confidence,
                    transcript, transcript_language, transcript_fetched_at, transcript_available
                )
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24,$25,$26)
                ON CONFLICT (shortcode) DO UPDATE SET
                    content_id = EXCLUDED.content_id,
                    kind = EXCLUDED.kind,
                    style = EXCLUDED.style,
                    url = EXCLUDED.url,
                    description = EXCLUDED.description,
                    thumb_key = EXCLUDED.thumb_key,
                    display_key = EXCLUDED.display_key,
                    view_count = EXCLUDED.view_count,
                    like_count = EXCLUDED.like_count,
                    comment_count = EXCLUDED.comment_count,
                    date_posted = EXCLUDED.date_posted,
                    outlier_score = EXCLUDED.outlier_score,
                    primary_category = EXCLUDED.primary_category,
                    secondary_category = EXCLUDED.secondary_category,
                    tertiary_category = EXCLUDED.tertiary_category,
                    keyword1 = EXCLUDED.keyword1,
                    keyword2 = EXCLUDED.keyword2,
                    keyword3 = EXCLUDED.keyword3,
                    keyword4 = EXCLUDED.keyword4,
                    confidence = EXCLUDED.confidence,
                    transcript = EXCLUDED.transcript,
                    transcript_language = EXCLUDED.transcript_language,
                    transcript_fetched_at = EXCLUDED.transcript_fetched_at,
                    transcript_available = EXCLUDED.transcript_available
                "#,
            )
            .bind(&item.content_id)
            .bind(&item.shortcode)
            .bind(&item.profile_owner)
            .bind(item.kind.0.as_storage_str())
            .bind(item.style.0.as_storage_str())
            .bind(&item.url)
            .bind(&item.description)
            .bind(&item.thumb_key)
            .bind(&item.display_key)
            .bind(item.view_count)
            .bind(item.like_count)
            .bind(item.comment_count)
            .bind(item.date_posted)
            .bind(item.outlier_score)
            .bind(&item.primary_category)
            .bind(&item.secondary_category)
            .bind(&item.tertiary_category)
            .bind(&item.keyword1)
            .bind(&item.keyword2)
            .bind(&item.keyword3)
            .bind(&item.keyword4)
            .bind(item.confidence)
            .bind(&item.transcript)
            .bind(&item.transcript_language)
            .bind(item.transcript_fetched_at)
            .bind(item.transcript_available)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Batch lookup by `content_id`, for resolving `ViralAnalysisReel`
    /// references into full rows (spec §6 viral-analysis results).
    pub async fn content_by_ids(&self, content_ids: &[String]) -> ApiResult<Vec<Content>> {
        if content_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Content>("SELECT * FROM contents WHERE content_id = ANY($1)")
            .bind(content_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn content_count_for_owner(&self, owner_username: &str) -> ApiResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM contents WHERE profile_owner = $1")
                .bind(owner_username.normalized_username())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    /// Existing `shortcode`s for an owner, for the pre-detail-fetch dedup
    /// spec §4.4 requires ("the set of shortcodes already present in
    /// Content for this username is subtracted from the candidate list").
    pub async fn shortcodes_for_owner(&self, owner_username: &str) -> ApiResult<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT shortcode FROM contents WHERE profile_owner = $1")
                .bind(owner_username.normalized_username())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(shortcode,)| shortcode).collect())
    }

    /// Top-`limit` content rows for an owner ordered by `outlierScore`,
    /// optionally restricted to posts on/after `since` (spec §4.7 "last 30
    /// days falling back to all-time" reel selection).
    pub async fn top_content_for_owner(
        &self,
        owner_username: &str,
        kind: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> ApiResult<Vec<Content>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT * FROM contents WHERE profile_owner = ");
        builder.push_bind(owner_username.normalized_username());
        if let Some(kind) = kind {
            builder.push(" AND kind = ").push_bind(kind.to_string());
        }
        if let Some(since) = since {
            builder.push(" AND date_posted >= ").push_bind(since);
        }
        builder.push(" ORDER BY outlier_score DESC NULLS LAST LIMIT ").push_bind(limit);
        let rows = builder.build_query_as::<Content>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// General-purpose reel/post search for `/api/reels` and `/api/posts`
    /// (spec §6). Dynamic `WHERE`/`ORDER BY` built with `QueryBuilder`.
    pub async fn search_content(&self, filter: &ContentFilter) -> ApiResult<(Vec<Content>, bool)> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("SELECT * FROM contents WHERE 1=1");

        if let Some(owner) = &filter.owner_username {
            builder.push(" AND profile_owner = ").push_bind(owner.normalized_username());
        }
        if let Some(kind) = &filter.content_kind {
            builder.push(" AND kind = ").push_bind(kind.clone());
        }
        if let Some(search) = &filter.search {
            builder.push(" AND description ILIKE ").push_bind(format!("%{search}%"));
        }
        if !filter.primary_categories.is_empty() {
            builder.push(" AND primary_category = ANY(").push_bind(filter.primary_categories.clone()).push(")");
        }
        if !filter.secondary_categories.is_empty() {
            builder.push(" AND secondary_category = ANY(").push_bind(filter.secondary_categories.clone()).push(")");
        }
        if !filter.tertiary_categories.is_empty() {
            builder.push(" AND tertiary_category = ANY(").push_bind(filter.tertiary_categories.clone()).push(")");
        }
        if !filter.content_styles.is_empty() {
            builder.push(" AND style = ANY(").push_bind(filter.content_styles.clone()).push(")");
        }
        if !filter.excluded_usernames.is_empty() {
            builder
                .push(" AND profile_owner <> ALL(")
                .push_bind(filter.excluded_usernames.iter().map(|u| u.normalized_username()).collect::<Vec<_>>())
                .push(")");
        }
        if let Some(min) = filter.min_outlier_score {
            builder.push(" AND outlier_score >= ").push_bind(min);
        }
        if let Some(max) = filter.max_outlier_score {
            builder.push(" AND outlier_score <= ").push_bind(max);
        }
        if let Some(min) = filter.min_views {
            builder.push(" AND view_count >= ").push_bind(min);
        }
        if let Some(max) = filter.max_views {
            builder.push(" AND view_count <= ").push_bind(max);
        }
        if let Some(min) = filter.min_likes {
            builder.push(" AND like_count >= ").push_bind(min);
        }
        if let Some(max) = filter.max_likes {
            builder.push(" AND like_count <= ").push_bind(max);
        }
        if let Some(min) = filter.min_comments {
            builder.push(" AND comment_count >= ").push_bind(min);
        }
        if let Some(max) = filter.max_comments {
            builder.push(" AND comment_count <= ").push_bind(max);
        }
        if let Some(since) = filter.posted_after {
            builder.push(" AND date_posted >= ").push_bind(since);
        }
        if !filter.keywords.is_empty() {
            builder.push(" AND (keyword1 = ANY(")
                .push_bind(filter.keywords.clone())
                .push(") OR keyword2 = ANY(")
                .push_bind(filter.keywords.clone())
                .push(") OR keyword3 = ANY(")
                .push_bind(filter.keywords.clone())
                .push(") OR keyword4 = ANY(")
                .push_bind(filter.keywords.clone())
                .push("))");
        }
        if filter.min_followers.is_some() || filter.max_followers.is_some() || filter.is_verified.is_some() {
            builder.push(" AND profile_owner IN (SELECT username FROM primary_profiles WHERE 1=1");
            if let Some(min) = filter.min_followers {
                builder.push(" AND followers >= ").push_bind(min);
            }
            if let Some(max) = filter.max_followers {
                builder.push(" AND followers <= ").push_bind(max);
            }
            if let Some(verified) = filter.is_verified {
                builder.push(" AND is_verified = ").push_bind(verified);
            }
            builder.push(")");
        }

        if filter.random_order {
            builder.push(" ORDER BY random()");
        } else {
            builder.push(" ORDER BY ").push(filter.sort_by.order_by_sql());
        }
        // fetch one extra row to derive `isLastPage` without a second COUNT query
        builder.push(" LIMIT ").push_bind(filter.limit + 1).push(" OFFSET ").push_bind(filter.offset);

        let mut rows = builder.build_query_as::<Content>().fetch_all(&self.pool).await?;
        let is_last_page = rows.len() as i64 <= filter.limit;
        rows.truncate(filter.limit as usize);
        Ok((rows, is_last_page))
    }

    /// Distinct values backing `/api/filter-options` (spec §6). Every
    /// `NULL`/empty value is dropped before returning.
    pub async fn distinct_content_filter_values(&self) -> ApiResult<FilterOptions> {
        let primary_categories = self.distinct_column("primary_category").await?;
        let secondary_categories = self.distinct_column("secondary_category").await?;
        let tertiary_categories = self.distinct_column("tertiary_category").await?;
        let content_styles = self.distinct_column("style").await?;
        let usernames: Vec<String> =
            sqlx::query_as("SELECT DISTINCT profile_owner FROM contents ORDER BY profile_owner")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|(u,): (String,)| u)
                .collect();
        let keywords = self.distinct_keywords().await?;

        Ok(FilterOptions {
            primary_categories,
            secondary_categories,
            tertiary_categories,
            keywords,
            usernames,
            content_styles,
        })
    }

    async fn distinct_column(&self, column: &str) -> ApiResult<Vec<String>> {
        let sql = format!("SELECT DISTINCT {column} FROM contents WHERE {column} IS NOT NULL ORDER BY {column}");
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    async fn distinct_keywords(&self) -> ApiResult<Vec<String>> {
        let rows: Vec<(Option<String>, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT DISTINCT keyword1, keyword2, keyword3, keyword4 FROM contents").fetch_all(&self.pool).await?;
        let mut set = HashSet::new();
        for (k1, k2, k3, k4) in rows {
            for k in [k1, k2, k3, k4].into_iter().flatten() {
                set.insert(k);
            }
        }
        let mut out: Vec<String> = set.into_iter().collect();
        out.sort();
        Ok(out)
    }
}

/// `/api/filter-options` response body (spec §6). `account_types` and
/// `languages` are fixed vocabularies, not query-derived, so they are
/// supplied by the handler rather than stored here.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub primary_categories: Vec<String>,
    pub secondary_categories: Vec<String>,
    pub tertiary_categories: Vec<String>,
    pub keywords: Vec<String>,
    pub usernames: Vec<String>,
    pub content_styles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_at_least_one() {
        assert_eq!(min_acceptance_threshold(0), 1);
        assert_eq!(min_acceptance_threshold(5), 1);
    }

    #[test]
    fn threshold_scales_with_expected_count() {
        assert_eq!(min_acceptance_threshold(100), 10);
        assert_eq!(min_acceptance_threshold(237), 23);
    }
}
