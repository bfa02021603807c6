use axum::{http::StatusCode, response::IntoResponse};

use super::error_responses::ErrorResponse;

pub async fn not_found() -> impl IntoResponse {
    ErrorResponse::new(StatusCode::NOT_FOUND, "Not found")
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
