//! Network discoverer (C9, spec §4.9): multi-round seed expansion over the
//! similar-profiles adapter, enqueuing newly-found accounts at LOW
//! priority. Grounded on `network_crawler.py`'s round-based crawl loop;
//! `used_seeds` is kept in-process per spec's "per session" framing.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::fetchers::SimilarProfilesFetcher;
use crate::models::{Priority, QueueItem};
use crate::queue::PriorityQueue;
use crate::store::Store;
use crate::utils::{ApiResult, StringExt};

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub max_rounds: u32,
    pub max_accounts_to_queue: usize,
    pub profiles_per_round: usize,
    pub follower_floor: Option<i64>,
    pub default_seed_username: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            max_accounts_to_queue: 100,
            profiles_per_round: 10,
            follower_floor: None,
            default_seed_username: "instagram".to_string(),
        }
    }
}

impl From<&crate::config::DiscoveryConfigSection> for DiscoveryConfig {
    fn from(section: &crate::config::DiscoveryConfigSection) -> Self {
        Self {
            max_rounds: section.max_rounds,
            max_accounts_to_queue: section.max_accounts_to_queue,
            profiles_per_round: section.profiles_per_round,
            follower_floor: section.follower_floor,
            default_seed_username: section.default_seed_username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundSummary {
    pub seed: String,
    pub candidates_considered: usize,
    pub queued: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DiscoveryResult {
    pub rounds: Vec<RoundSummary>,
    pub total_queued: usize,
    pub strategy: String,
}

pub struct NetworkDiscoverer {
    store: Arc<Store>,
    similar_fetcher: Arc<dyn SimilarProfilesFetcher>,
    queue: Arc<PriorityQueue>,
    config: DiscoveryConfig,
    used_seeds: Mutex<HashSet<String>>,
}

impl NetworkDiscoverer {
    pub fn new(
        store: Arc<Store>,
        similar_fetcher: Arc<dyn SimilarProfilesFetcher>,
        queue: Arc<PriorityQueue>,
        config: DiscoveryConfig,
    ) -> Self {
        Self { store, similar_fetcher, queue, config, used_seeds: Mutex::new(HashSet::new()) }
    }

    /// Picks an unused `PrimaryProfile` username uniformly at random, or
    /// the configured default if every known primary has already seeded a
    /// round this session. Returns `None` when even the default is spent
    /// (spec's termination condition).
    async fn select_seed(&self) -> ApiResult<Option<String>> {
        let mut used = self.used_seeds.lock().await;
        let candidates = self.store.all_primary_usernames().await?;
        let unused: Vec<&String> = candidates.iter().filter(|u| !used.contains(u.as_str())).collect();

        let seed = if let Some(pick) = unused.choose(&mut rand::thread_rng()) {
            (*pick).clone()
        } else if !used.contains(&self.config.default_seed_username) {
            self.config.default_seed_username.clone()
        } else {
            return Ok(None);
        };

        used.insert(seed.clone());
        Ok(Some(seed))
    }

    async fn run_round(&self, seed: &str, remaining_slots: usize) -> ApiResult<RoundSummary> {
        let similar = self
            .similar_fetcher
            .fetch_similar(seed)
            .await
            .map_err(|e| crate::utils::ApiError::internal_error(format!("similar-profiles fetch failed: {e}")))?;
        let candidates_considered = similar.len();

        let candidate_usernames: Vec<String> = similar.iter().map(|d| d.username.clone()).collect();
        let known = self.store.known_usernames(&candidate_usernames).await?;

        let mut eligible: Vec<_> = similar
            .into_iter()
            .filter(|d| !known.contains(&d.username.normalized_username()))
            .filter(|d| self.config.follower_floor.is_none_or(|floor| d.followers >= floor))
            .collect();
        eligible.sort_by(|a, b| b.followers.cmp(&a.followers));

        let round_target = remaining_slots.min(self.config.profiles_per_round);
        eligible.truncate(round_target);

        let mut queued = 0;
        for descriptor in &eligible {
            let item = QueueItem::new(descriptor.username.clone(), "discovery", Priority::Low);
            if self.queue.enqueue(&item).await? {
                queued += 1;
            }
        }

        Ok(RoundSummary { seed: seed.to_string(), candidates_considered, queued })
    }

    pub async fn run(&self) -> ApiResult<DiscoveryResult> {
        let mut rounds = Vec::new();
        let mut total_queued = 0usize;

        for round_number in 0..self.config.max_rounds {
            if total_queued >= self.config.max_accounts_to_queue {
                break;
            }
            let Some(seed) = self.select_seed().await? else {
                break;
            };

            let remaining_slots = self.config.max_accounts_to_queue - total_queued;
            let summary = self.run_round(&seed, remaining_slots).await?;
            total_queued += summary.queued;
            tracing::info!(round = round_number, seed = %summary.seed, queued = summary.queued, "discovery round complete");
            rounds.push(summary);
        }

        let strategy = if total_queued >= self.config.max_accounts_to_queue {
            "queue-capacity-reached"
        } else if rounds.len() as u32 >= self.config.max_rounds {
            "max-rounds-reached"
        } else {
            "seeds-exhausted"
        };

        Ok(DiscoveryResult { rounds, total_queued, strategy: strategy.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let config = DiscoveryConfig::default();
        assert!(config.max_rounds > 0);
        assert!(config.max_accounts_to_queue > 0);
    }
}
