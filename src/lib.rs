//! Viralspot library
//!
//! Core modules for the viral-ideas analytics pipeline: storage, external
//! fetchers, categorisation, the fetch pipeline, the priority queue and its
//! worker pool, the viral workflow engine and its AI sub-pipeline, and the
//! network discoverer.

use std::sync::Arc;

pub mod categoriser;
pub mod config;
pub mod db;
pub mod discovery;
pub mod fetchers;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod utils;
pub mod viral;
pub mod workers;

pub use config::Config;

/// Application shared state.
///
/// One `Arc<Component>` field per component of §2; handlers reach every
/// component through this struct rather than constructing their own.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<store::Store>,
    pub pipeline: Arc<pipeline::Pipeline>,
    pub queue: Arc<queue::PriorityQueue>,
    pub worker_pool: Arc<workers::WorkerPool>,
    pub viral_engine: Arc<viral::ViralEngine>,
    pub viral_loop: Arc<viral::ViralWorkflowLoop>,
    pub discoverer: Arc<discovery::NetworkDiscoverer>,
    pub config: config::Config,
}
