//! `SimilarProfilesCache` persistence (spec §3), owned for writes by C9.

use crate::models::SimilarProfilesCache;
use crate::utils::{ApiResult, StringExt};

use super::Store;

impl Store {
    pub async fn upsert_similar_cache_batch(&self, items: &[SimilarProfilesCache]) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO similar_profiles_cache (
                    primary_username, similar_username, name, image_key, rank,
                    batch_id, created_at, image_downloaded
                )
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
                ON CONFLICT (primary_username, similar_username) DO UPDATE SET
                    name = EXCLUDED.name,
                    image_key = EXCLUDED.image_key,
                    rank = EXCLUDED.rank,
                    batch_id = EXCLUDED.batch_id,
                    created_at = EXCLUDED.created_at,
                    image_downloaded = EXCLUDED.image_downloaded
                "#,
            )
            .bind(item.primary_username.normalized_username())
            .bind(item.similar_username.normalized_username())
            .bind(&item.name)
            .bind(&item.image_key)
            .bind(item.rank)
            .bind(&item.batch_id)
            .bind(item.created_at)
            .bind(item.image_downloaded)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn similar_cache_for(&self, primary_username: &str) -> ApiResult<Vec<SimilarProfilesCache>> {
        let rows = sqlx::query_as::<_, SimilarProfilesCache>(
            "SELECT * FROM similar_profiles_cache WHERE primary_username = $1 ORDER BY rank ASC",
        )
        .bind(primary_username.normalized_username())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
