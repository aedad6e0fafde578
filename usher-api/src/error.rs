use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use usher_admission::AdmissionError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        let msg = err.to_string();
        match err {
            AdmissionError::ScreeningNotFound(_) | AdmissionError::ReservationNotFound(_) => {
                Self::NotFound(msg)
            }
            AdmissionError::SeatOutOfRange { .. } => Self::BadRequest(msg),
            AdmissionError::StoreUnavailable(_) | AdmissionError::CatalogUnavailable(_) => {
                Self::Unavailable(msg)
            }
            AdmissionError::CorruptRecord(detail) => {
                Self::Internal(anyhow::anyhow!("malformed stored record: {}", detail))
            }
        }
    }
}
