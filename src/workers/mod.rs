//! Queue worker pool (C6, spec §4.6), one long-running loop per process.
//! Grounded on the teacher's `ScheduledTask`/`ScheduledExecutor`
//! (utils/scheduled_executor.rs): each tick is one `ScheduledTask::run`
//! call, with the running-task bookkeeping held in `Mutex`-guarded
//! interior state so `run(&self)` can stay a shared borrow.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{Priority, QueueStatus};
use crate::pipeline::Pipeline;
use crate::queue::PriorityQueue;
use crate::utils::ScheduledTask;

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const STATS_LOG_EVERY_N_TICKS: u64 = 30;

struct RunningTask {
    request_id: Uuid,
    handle: JoinHandle<()>,
}

pub struct WorkerPool {
    queue: Arc<PriorityQueue>,
    pipeline: Arc<Pipeline>,
    max_concurrent_high: usize,
    max_concurrent_low: usize,
    high_tasks: Mutex<Vec<RunningTask>>,
    low_tasks: Mutex<Vec<RunningTask>>,
    shutting_down: AtomicBool,
    tick_count: AtomicU64,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<PriorityQueue>,
        pipeline: Arc<Pipeline>,
        max_concurrent_high: usize,
        max_concurrent_low: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            pipeline,
            max_concurrent_high,
            max_concurrent_low,
            high_tasks: Mutex::new(Vec::new()),
            low_tasks: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
        })
    }

    pub fn tick_interval() -> Duration {
        TICK_INTERVAL
    }

    /// Stop claiming new work; the caller should follow with
    /// `await_shutdown` after the executor loop (driven by
    /// `should_terminate`) has stopped.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Cancels all running tasks and awaits them with a bounded deadline
    /// (spec §4.6 graceful shutdown); paused items stay PENDING for the
    /// next process via `recover_stuck_items`/`requeue_paused`.
    pub async fn await_shutdown(&self, deadline: Duration) {
        let mut high = self.high_tasks.lock().await;
        let mut low = self.low_tasks.lock().await;
        let handles: Vec<JoinHandle<()>> = high.drain(..).chain(low.drain(..)).map(|t| t.handle).collect();
        let joined = tokio::time::timeout(deadline, futures::future::join_all(handles)).await;
        if joined.is_err() {
            tracing::warn!("worker pool shutdown deadline exceeded, remaining tasks aborted on drop");
        }
    }

    async fn reap(tasks: &mut Vec<RunningTask>) {
        tasks.retain(|t| !t.handle.is_finished());
    }

    async fn cancel_all_low(&self, low: &mut Vec<RunningTask>) {
        if low.is_empty() {
            return;
        }
        let ids: Vec<Uuid> = low.iter().map(|t| t.request_id).collect();
        for task in low.drain(..) {
            task.handle.abort();
        }
        if let Err(e) = self.queue.pause_low_items(&ids).await {
            tracing::warn!(error = %e, "failed to mark preempted LOW items PAUSED");
        } else {
            tracing::info!(count = ids.len(), "HIGH pending, preempted running LOW tasks");
        }
    }

    async fn spawn_high(&self, high: &mut Vec<RunningTask>) -> anyhow::Result<bool> {
        let Some(item) = self.queue.claim_next(Some(Priority::High)).await? else {
            return Ok(false);
        };
        let request_id = item.request_id;
        let username = item.username.clone();
        let pipeline = self.pipeline.clone();
        let queue = self.queue.clone();
        let handle = tokio::spawn(async move {
            let result = pipeline.run_complete(&username).await;
            let outcome = match result {
                Ok(_) => queue.update_status(request_id, QueueStatus::Completed, None).await,
                Err(e) => queue.update_status(request_id, QueueStatus::Failed, Some(&e.to_string())).await,
            };
            if let Err(e) = outcome {
                tracing::error!(%request_id, error = %e, "failed to record HIGH task outcome");
            }
        });
        high.push(RunningTask { request_id, handle });
        Ok(true)
    }

    async fn spawn_low(&self, low: &mut Vec<RunningTask>) -> anyhow::Result<bool> {
        let Some(item) = self.queue.claim_next(Some(Priority::Low)).await? else {
            return Ok(false);
        };
        let request_id = item.request_id;
        let username = item.username.clone();
        let pipeline = self.pipeline.clone();
        let queue = self.queue.clone();
        let handle = tokio::spawn(async move {
            let result = pipeline.run_low_priority(&username).await;
            let outcome = match result {
                Ok(_) => queue.update_status(request_id, QueueStatus::Completed, None).await,
                Err(e) => queue.update_status(request_id, QueueStatus::Failed, Some(&e.to_string())).await,
            };
            if let Err(e) = outcome {
                tracing::error!(%request_id, error = %e, "failed to record LOW task outcome");
            }
        });
        low.push(RunningTask { request_id, handle });
        Ok(true)
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let mut high = self.high_tasks.lock().await;
        let mut low = self.low_tasks.lock().await;
        Self::reap(&mut high).await;
        Self::reap(&mut low).await;

        if self.shutting_down.load(Ordering::SeqCst) {
            return Ok(());
        }

        let has_high = self.queue.has_high_pending().await?;
        if has_high && !low.is_empty() {
            self.cancel_all_low(&mut low).await;
        }

        if has_high {
            while high.len() < self.max_concurrent_high {
                if !self.spawn_high(&mut high).await? {
                    break;
                }
            }
        } else {
            while low.len() < self.max_concurrent_low {
                if !self.spawn_low(&mut low).await? {
                    break;
                }
            }
        }

        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % STATS_LOG_EVERY_N_TICKS == 0 {
            match self.queue.stats().await {
                Ok(stats) => tracing::info!(?stats, high_running = high.len(), low_running = low.len(), "queue stats"),
                Err(e) => tracing::warn!(error = %e, "failed to fetch queue stats"),
            }
        }

        Ok(())
    }
}

impl ScheduledTask for WorkerPool {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move { self.tick().await })
    }

    fn should_terminate(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_matches_spec_cadence() {
        assert_eq!(WorkerPool::tick_interval(), Duration::from_secs(1));
    }
}
