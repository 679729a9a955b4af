//! HTTP error responses
//!
//! Maps library errors onto HTTP statuses and the JSON error body. Validation
//! failures carry their specific message back to the caller; server-side
//! conversion failures are logged in full but surfaced with a deliberately
//! generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vid2aud_lib::ConvertError;

/// JSON body returned for every error response
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: error.to_string(),
                message: message.into(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation failed", message)
    }

    pub fn internal(detail: impl AsRef<str>) -> Self {
        tracing::error!(detail = detail.as_ref(), "internal server error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error",
            "an unexpected error occurred",
        )
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        match &err {
            ConvertError::InvalidInput(_) | ConvertError::UnsupportedFormat(_) => {
                Self::bad_request(err.to_string())
            }
            ConvertError::UnreadableSource(_)
            | ConvertError::EncodeFailure(_)
            | ConvertError::Conversion(_)
            | ConvertError::Io(_) => {
                tracing::error!(error = %err, "conversion failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "conversion failed",
                    "an error occurred while converting the video",
                )
            }
            ConvertError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err = ApiError::from(ConvertError::UnsupportedFormat("ogv".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.body.message.contains("ogv"));

        let err = ApiError::from(ConvertError::InvalidInput("bitrate out of range".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.body.message.contains("bitrate"));
    }

    #[test]
    fn test_conversion_errors_hide_detail() {
        let err = ApiError::from(ConvertError::UnreadableSource(
            "/tmp/video-123.mp4: moov atom not found".into(),
        ));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body.message.contains("/tmp"));
        assert_eq!(err.body.error, "conversion failed");
    }

    #[test]
    fn test_body_shape() {
        let err = ApiError::bad_request("no file selected");
        let value = serde_json::to_value(&err.body).unwrap();
        assert_eq!(value["error"], "validation failed");
        assert_eq!(value["message"], "no file selected");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = ApiError::from(ConvertError::Internal("ffmpeg exploded".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body.message.contains("ffmpeg"));
    }
}
