//! HTTP API handlers (spec §6). Grounded on the teacher's
//! `State<Arc<AppState>>` / `Result<impl IntoResponse, ApiError>` handler
//! shape; responses are wrapped in [`crate::utils::Envelope`].

pub mod filter_options;
pub mod health;
pub mod posts;
pub mod profile;
pub mod reels;
pub mod viral_analysis;
pub mod viral_ideas;
