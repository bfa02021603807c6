use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::usecases::payments::{GatewayOutcome, PaymentError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            // Don't leak store or internal detail to the client
            PaymentError::Store { outcome, .. } => {
                error!(
                    error = ?self,
                    manual_reconciliation = self.requires_manual_reconciliation(),
                    "payments: request failed"
                );
                match outcome {
                    GatewayOutcome::NotCalled => "Internal server error".to_string(),
                    GatewayOutcome::Committed { external_id } => format!(
                        "Gateway operation {external_id} succeeded but the local record is pending reconciliation"
                    ),
                    GatewayOutcome::Compensated { external_id } => format!(
                        "Local record could not be saved; gateway operation {external_id} was reverted"
                    ),
                }
            }
            PaymentError::Internal(_) => {
                error!(error = ?self, "payments: request failed");
                "Internal server error".to_string()
            }
            PaymentError::Gateway(_) => "Payment gateway request failed".to_string(),
            _ => self.to_string(),
        };

        ErrorResponse::new(status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn store_errors_hide_detail() {
        let response = PaymentError::Store {
            source: anyhow!("password authentication failed for user payments"),
            outcome: GatewayOutcome::NotCalled,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn message_of(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn committed_store_error_tells_caller_the_gateway_change_stands() {
        let response = PaymentError::Store {
            source: anyhow!("connection reset by peer"),
            outcome: GatewayOutcome::Committed {
                external_id: "pi_orphan".to_string(),
            },
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = message_of(response).await;
        assert!(message.contains("pi_orphan"));
        assert!(message.contains("pending reconciliation"));
        assert!(!message.contains("connection reset"));
    }

    #[tokio::test]
    async fn compensated_store_error_says_the_gateway_change_was_reverted() {
        let response = PaymentError::Store {
            source: anyhow!("duplicate key value violates unique constraint"),
            outcome: GatewayOutcome::Compensated {
                external_id: "sub_rolled_back".to_string(),
            },
        }
        .into_response();

        let message = message_of(response).await;
        assert!(message.contains("reverted"));
        assert!(!message.contains("duplicate key"));
    }

    #[tokio::test]
    async fn store_error_without_gateway_call_stays_generic() {
        let response = PaymentError::Store {
            source: anyhow!("password authentication failed for user payments"),
            outcome: GatewayOutcome::NotCalled,
        }
        .into_response();

        assert_eq!(message_of(response).await, "Internal server error");
    }

    #[test]
    fn conflict_keeps_its_status() {
        let response =
            PaymentError::Conflict("subscription is already canceled".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
