//! Success-path counterpart to [`super::error::ApiError`]'s `IntoResponse`
//! impl: every handler returns `{success, data, message?}` (spec §6).

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

pub struct Envelope<T: Serialize>(pub T);

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self(data)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(json!({
            "success": true,
            "data": self.0,
            "message": null,
        }))
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_data_under_success_true() {
        let response = Envelope::new(json!({"a": 1})).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
