//! Thin typed adapters over the third-party Instagram/LLM/transcript APIs
//! (spec §4.2, C2). Each adapter is a small trait with one live
//! `reqwest`-backed implementation and one in-memory fake for tests,
//! mirroring `cluster_adapter`'s trait-plus-factory shape and
//! `LLMClient::chat_completion`'s typed-request/typed-response call style.

pub mod bulk_reels;
pub mod detail;
pub mod listing;
pub mod llm_chat;
pub mod profile;
pub mod retry;
pub mod similar;
pub mod transcript;

pub use bulk_reels::{BulkReelsFetcher, RawReel};
pub use detail::{DetailFetcher, MediaDetail};
pub use listing::{ListingFetcher, ListingPage};
pub use llm_chat::LlmChatFetcher;
pub use profile::{ExternalProfile, ProfileFetcher};
pub use similar::{SimilarProfileDescriptor, SimilarProfilesFetcher};
pub use transcript::{Transcript, TranscriptFetcher};

use thiserror::Error;

/// Error kinds adapters may return (spec §7): `Transient`/`RateLimited` are
/// recovered locally by [`retry::with_retry`] and should rarely escape an
/// adapter call; `NotFound`/`Malformed` are the caller's problem.
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("transient error: {0}")]
    Transient(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("not found")]
    NotFound,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }
}
