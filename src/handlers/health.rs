//! `GET /health` and `GET /` (spec §6).

use axum::response::IntoResponse;
use serde_json::json;

use crate::utils::Envelope;

pub async fn health() -> impl IntoResponse {
    Envelope::new(json!({"status": "ok"}))
}

pub async fn root() -> impl IntoResponse {
    Envelope::new(json!({"service": "viralspot"}))
}
