//! `UpsertSecondaryBatch` (spec §3, §4.1): discovered profiles, owned for
//! writes by C9 during network expansion.

use crate::models::SecondaryProfile;
use crate::utils::{ApiResult, StringExt};

use super::Store;

impl Store {
    pub async fn upsert_secondary_batch(
        &self,
        items: &[SecondaryProfile],
        discovered_by: i64,
    ) -> ApiResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut saved = 0;
        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO secondary_profiles (
                    username, full_name, bio, followers, following, media_count,
                    image_key, is_verified, account_type, primary_category,
                    secondary_category, tertiary_category, discovered_by, similarity_rank
                )
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
                ON CONFLICT (username) DO UPDATE SET
                    full_name = EXCLUDED.full_name,
                    bio = EXCLUDED.bio,
                    followers = EXCLUDED.followers,
                    following = EXCLUDED.following,
                    media_count = EXCLUDED.media_count,
                    image_key = EXCLUDED.image_key,
                    is_verified = EXCLUDED.is_verified,
                    account_type = EXCLUDED.account_type,
                    primary_category = EXCLUDED.primary_category,
                    secondary_category = EXCLUDED.secondary_category,
                    tertiary_category = EXCLUDED.tertiary_category,
                    discovered_by = EXCLUDED.discovered_by,
                    similarity_rank = EXCLUDED.similarity_rank
                "#,
            )
            .bind(item.username.normalized_username())
            .bind(&item.full_name)
            .bind(&item.bio)
            .bind(item.followers)
            .bind(item.following)
            .bind(item.media_count)
            .bind(&item.image_key)
            .bind(item.is_verified)
            .bind(item.account_type.0.for_storage().as_str())
            .bind(&item.primary_category)
            .bind(&item.secondary_category)
            .bind(&item.tertiary_category)
            .bind(discovered_by)
            .bind(item.similarity_rank)
            .execute(&mut *tx)
            .await;
            if result.is_ok() {
                saved += 1;
            }
        }
        tx.commit().await?;
        Ok(saved)
    }

    pub async fn secondary_count_for_owner(&self, discovered_by: i64) -> ApiResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM secondary_profiles WHERE discovered_by = $1")
                .bind(discovered_by)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    pub async fn get_secondary(&self, username: &str) -> ApiResult<Option<SecondaryProfile>> {
        let row = sqlx::query_as::<_, SecondaryProfile>("SELECT * FROM secondary_profiles WHERE username = $1")
            .bind(username.normalized_username())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
