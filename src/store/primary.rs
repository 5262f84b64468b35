//! `UpsertPrimary` and primary-profile reads (spec §3, §4.1).

use crate::models::PrimaryProfile;
use crate::utils::{ApiResult, StringExt};

use super::Store;

impl Store {
    /// Upsert keyed on `username` (case-insensitive, stored lowercased).
    /// `accountType` is folded through [`crate::models::AccountType::for_storage`]
    /// before the write so a categoriser-only `ThemePage` never lands in the
    /// column (spec §4.1 allow-list/normalisation rule).
    pub async fn upsert_primary(&self, profile: &PrimaryProfile) -> ApiResult<()> {
        let username = profile.username.normalized_username();
        let account_type = profile.account_type.0.for_storage().as_str();

        sqlx::query(
            r#"
            INSERT INTO primary_profiles (
                username, display_name, bio, followers, posts_count, is_verified,
                account_type, image_key, primary_category, secondary_category,
                tertiary_category, total_reels, median_views, mean_views, std_views,
                total_views, total_likes, total_comments, similar, last_full_scrape,
                analysis_timestamp
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
            ON CONFLICT (username) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                bio = EXCLUDED.bio,
                followers = EXCLUDED.followers,
                posts_count = EXCLUDED.posts_count,
                is_verified = EXCLUDED.is_verified,
                account_type = EXCLUDED.account_type,
                image_key = EXCLUDED.image_key,
                primary_category = EXCLUDED.primary_category,
                secondary_category = EXCLUDED.secondary_category,
                tertiary_category = EXCLUDED.tertiary_category,
                total_reels = EXCLUDED.total_reels,
                median_views = EXCLUDED.median_views,
                mean_views = EXCLUDED.mean_views,
                std_views = EXCLUDED.std_views,
                total_views = EXCLUDED.total_views,
                total_likes = EXCLUDED.total_likes,
                total_comments = EXCLUDED.total_comments,
                similar = EXCLUDED.similar,
                last_full_scrape = EXCLUDED.last_full_scrape,
                analysis_timestamp = EXCLUDED.analysis_timestamp
            "#,
        )
        .bind(&username)
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(profile.followers)
        .bind(profile.posts_count)
        .bind(profile.is_verified)
        .bind(account_type)
        .bind(&profile.image_key)
        .bind(&profile.primary_category)
        .bind(&profile.secondary_category)
        .bind(&profile.tertiary_category)
        .bind(profile.total_reels)
        .bind(profile.median_views)
        .bind(profile.mean_views)
        .bind(profile.std_views)
        .bind(profile.total_views)
        .bind(profile.total_likes)
        .bind(profile.total_comments)
        .bind(&profile.similar)
        .bind(profile.last_full_scrape)
        .bind(profile.analysis_timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_primary(&self, username: &str) -> ApiResult<Option<PrimaryProfile>> {
        let profile = sqlx::query_as::<_, PrimaryProfile>(
            "SELECT * FROM primary_profiles WHERE username = $1",
        )
        .bind(username.normalized_username())
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    pub(crate) async fn primary_id_for_username(&self, username: &str) -> ApiResult<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM primary_profiles WHERE username = $1")
                .bind(username.normalized_username())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Every known primary username, for C9's seed selection.
    pub async fn all_primary_usernames(&self) -> ApiResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT username FROM primary_profiles").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }
}
