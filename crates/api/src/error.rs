use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use chrono::{SecondsFormat, Utc};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Message sent when the shared access password is missing or wrong.
pub const INVALID_PASSWORD_MESSAGE: &str = "Forbidden - Invalid password";

pub use domain::services::access::INVALID_ADMIN_PASSWORD_MESSAGE;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: bool,
    message: String,
    timestamp: String,
}

/// Current time as RFC 3339 with seconds precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamRejected(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Forbidden(msg) | ApiError::Validation(msg) => msg,
            ApiError::MethodNotAllowed => "Method not allowed".into(),
            ApiError::RateLimited => "Too many requests. Please try again later.".into(),
            ApiError::Timeout => "Request timed out".into(),
            ApiError::UpstreamUnavailable(msg) | ApiError::UpstreamRejected(msg) => msg,
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".into()
            }
        };

        let body = ErrorBody {
            error: true,
            message,
            timestamp: timestamp_now(),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts errors raised by fallible tower layers into JSON responses.
pub async fn handle_layer_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request exceeded the server timeout");
        ApiError::Timeout
    } else {
        ApiError::Internal(err.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::AuthorizationFailure(msg) => ApiError::Forbidden(msg),
            DomainError::ValidationFailure(msg) => ApiError::Validation(msg),
            DomainError::UpstreamUnavailable(ref source) => {
                tracing::error!(error = %source, "Tracking server unavailable");
                ApiError::UpstreamUnavailable(err.to_string())
            }
            DomainError::UpstreamRejected(ref source) => {
                tracing::error!(error = %source, "Tracking server rejected request");
                ApiError::UpstreamRejected(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domain::services::SourceError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(
            ApiError::Forbidden("x".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MethodNotAllowed.into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::RateLimited.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::UpstreamUnavailable("x".into())
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::UpstreamRejected("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::Forbidden(INVALID_PASSWORD_MESSAGE.into()).into_response();
        let body = body_json(response).await;

        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Forbidden - Invalid password");
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_layer_timeout_becomes_json_408() {
        let err: BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let response = handle_layer_error(err).await.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let body = body_json(response).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Request timed out");
    }

    #[tokio::test]
    async fn test_other_layer_errors_are_internal() {
        let err: BoxError = "service overloaded".into();
        let response = handle_layer_error(err).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal("client pool exhausted".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_from_domain_error() {
        let err: ApiError = DomainError::UpstreamUnavailable(SourceError::Timeout).into();
        match err {
            ApiError::UpstreamUnavailable(msg) => {
                assert_eq!(msg, "Unable to fetch data from tracking server")
            }
            other => panic!("Expected UpstreamUnavailable, got {:?}", other),
        }

        let err: ApiError = DomainError::UpstreamRejected(SourceError::Status {
            status: 400,
            message: "Duplicate entry".into(),
        })
        .into();
        match err {
            ApiError::UpstreamRejected(msg) => assert!(msg.contains("Duplicate entry")),
            other => panic!("Expected UpstreamRejected, got {:?}", other),
        }

        let err: ApiError = DomainError::ValidationFailure("bad".into()).into();
        assert!(matches!(err, ApiError::Validation(_)));

        let err: ApiError =
            DomainError::AuthorizationFailure(INVALID_ADMIN_PASSWORD_MESSAGE.into()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Forbidden("test".to_string())),
            "Forbidden: test"
        );
        assert_eq!(format!("{}", ApiError::MethodNotAllowed), "Method not allowed");
        assert_eq!(format!("{}", ApiError::RateLimited), "Rate limited");
    }
}
