//! Adaptive-concurrency detail fetching (spec §4.4): batch size starts at
//! 3 (min 1, max 8); two consecutive batches above 80% success grow the
//! batch by one; any 429 in a batch shrinks it by one and retries the
//! *same* batch up to twice with `min(30, 5*2^attempt)` backoff. A hard
//! cap of 20 pagination pages is enforced by the caller, not here.

use futures::future::join_all;
use std::time::Duration;

use crate::fetchers::detail::MediaDetail;
use crate::fetchers::{DetailFetcher, FetchError};

const MIN_BATCH: usize = 1;
const MAX_BATCH: usize = 8;
const GROW_THRESHOLD: f64 = 0.8;
const MAX_BATCH_RETRIES: u32 = 2;

pub struct AdaptiveBatcher {
    batch_size: usize,
    consecutive_good_batches: u32,
}

impl Default for AdaptiveBatcher {
    fn default() -> Self {
        Self { batch_size: 3, consecutive_good_batches: 0 }
    }
}

impl AdaptiveBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn shrink(&mut self) {
        self.batch_size = self.batch_size.saturating_sub(1).max(MIN_BATCH);
        self.consecutive_good_batches = 0;
    }

    fn record_success_rate(&mut self, rate: f64) {
        if rate > GROW_THRESHOLD {
            self.consecutive_good_batches += 1;
            if self.consecutive_good_batches >= 2 {
                self.batch_size = (self.batch_size + 1).min(MAX_BATCH);
                self.consecutive_good_batches = 0;
            }
        } else {
            self.consecutive_good_batches = 0;
        }
    }
}

pub fn batch_retry_backoff(attempt: u32) -> Duration {
    let secs = 5.0 * 2f64.powi(attempt as i32);
    Duration::from_secs_f64(secs.min(30.0))
}

/// Fetches detail for every content id, chunked by the current adaptive
/// batch size. Returns one result per input id, in order.
pub async fn fetch_details_adaptive(
    fetcher: &dyn DetailFetcher,
    content_ids: &[String],
) -> Vec<(String, Result<MediaDetail, FetchError>)> {
    let mut batcher = AdaptiveBatcher::new();
    let mut results = Vec::with_capacity(content_ids.len());
    let mut remaining = content_ids;

    while !remaining.is_empty() {
        let size = batcher.batch_size().min(remaining.len());
        let (chunk, rest) = remaining.split_at(size);
        remaining = rest;

        let mut attempt = 0;
        loop {
            let chunk_results: Vec<Result<MediaDetail, FetchError>> =
                join_all(chunk.iter().map(|id| fetcher.fetch_detail(id))).await;

            let hit_rate_limit = chunk_results.iter().any(|r| matches!(r, Err(FetchError::RateLimited { .. })));
            let successes = chunk_results.iter().filter(|r| r.is_ok()).count();
            let success_rate = successes as f64 / chunk.len() as f64;

            if hit_rate_limit && attempt < MAX_BATCH_RETRIES {
                batcher.shrink();
                tokio::time::sleep(batch_retry_backoff(attempt)).await;
                attempt += 1;
                continue;
            }

            batcher.record_success_rate(success_rate);
            for (id, result) in chunk.iter().zip(chunk_results) {
                results.push((id.clone(), result));
            }
            break;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_retry_backoff_caps_at_thirty_seconds() {
        assert_eq!(batch_retry_backoff(0), Duration::from_secs_f64(5.0));
        assert_eq!(batch_retry_backoff(1), Duration::from_secs_f64(10.0));
        assert_eq!(batch_retry_backoff(3), Duration::from_secs_f64(30.0));
        assert_eq!(batch_retry_backoff(10), Duration::from_secs_f64(30.0));
    }

    #[test]
    fn grows_after_two_consecutive_good_batches() {
        let mut batcher = AdaptiveBatcher::new();
        assert_eq!(batcher.batch_size(), 3);
        batcher.record_success_rate(0.9);
        assert_eq!(batcher.batch_size(), 3);
        batcher.record_success_rate(0.9);
        assert_eq!(batcher.batch_size(), 4);
    }

    #[test]
    fn shrinks_on_rate_limit_and_resets_streak() {
        let mut batcher = AdaptiveBatcher::new();
        batcher.record_success_rate(0.9);
        batcher.shrink();
        assert_eq!(batcher.batch_size(), 2);
        batcher.record_success_rate(0.9);
        assert_eq!(batcher.batch_size(), 2);
    }

    #[test]
    fn never_shrinks_below_min_or_grows_above_max() {
        let mut batcher = AdaptiveBatcher { batch_size: MIN_BATCH, consecutive_good_batches: 0 };
        batcher.shrink();
        assert_eq!(batcher.batch_size(), MIN_BATCH);

        let mut batcher = AdaptiveBatcher { batch_size: MAX_BATCH, consecutive_good_batches: 0 };
        batcher.record_success_rate(1.0);
        batcher.record_success_rate(1.0);
        assert_eq!(batcher.batch_size(), MAX_BATCH);
    }

    #[tokio::test]
    async fn fetch_details_adaptive_preserves_order_and_results() {
        use crate::fetchers::detail::FakeDetailFetcher;
        let fetcher = FakeDetailFetcher::new();
        fetcher.seed(MediaDetail { content_id: "a".into(), like_count: 1, ..Default::default() });
        fetcher.seed(MediaDetail { content_id: "b".into(), like_count: 2, ..Default::default() });

        let ids = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let results = fetch_details_adaptive(&fetcher, &ids).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1.is_ok());
        assert_eq!(results[2].0, "missing");
        assert!(matches!(results[2].1, Err(FetchError::NotFound)));
    }
}
