//! API error responses
//!
//! Authentication failures map to a deliberately uniform 401 body; the
//! detailed internal code exists only in usage records.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::auth::AuthFailure;
use crate::domain::DomainError;

/// Error categories exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    AuthenticationError,
    PermissionError,
    NotFoundError,
    RateLimitError,
    ServerError,
    ServiceUnavailableError,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
}

/// API error with status code and optional auth headers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
    /// WWW-Authenticate challenge naming the expected header
    challenge_header: Option<String>,
    /// Retry-After hint in seconds
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                },
            },
            challenge_header: None,
            retry_after_secs: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiErrorType::InvalidRequestError,
            message,
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ApiErrorType::AuthenticationError,
            message,
        )
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, ApiErrorType::PermissionError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorType::NotFoundError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ApiErrorType::RateLimitError,
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorType::ServerError,
            message,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }

    /// Map an engine denial to the transport response.
    ///
    /// All credential failures share one information-minimal 401 body; only
    /// scope, rate-limit and store failures are distinguishable from the
    /// outside.
    pub fn from_auth_failure(
        failure: &AuthFailure,
        expected_header: &str,
        retry_after_secs: Option<u64>,
    ) -> Self {
        match failure {
            AuthFailure::MissingCredential
            | AuthFailure::InvalidKey
            | AuthFailure::Revoked
            | AuthFailure::Inactive
            | AuthFailure::Expired
            | AuthFailure::IpNotAllowed => Self::unauthorized(format!(
                "Invalid or missing API key. Provide a valid key in the '{}' header.",
                expected_header
            ))
            .with_challenge(format!("ApiKey header=\"{}\"", expected_header)),

            AuthFailure::InsufficientScope => {
                Self::forbidden("The API key does not grant the required scope for this operation.")
            }

            AuthFailure::RateLimited => {
                let mut error = Self::rate_limited("Rate limit exceeded. Slow down and retry.");
                error.retry_after_secs = retry_after_secs;
                error
            }

            AuthFailure::StoreUnavailable => {
                Self::unavailable("Service temporarily unavailable. Retry shortly.")
            }
        }
    }

    fn with_challenge(mut self, challenge: String) -> Self {
        self.challenge_header = Some(challenge);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(challenge) = self.challenge_header {
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::InvalidId { message } => Self::bad_request(message),
            DomainError::Conflict { message } => Self::bad_request(message),
            DomainError::Configuration { message } => Self::internal(message),
            DomainError::Internal { message } => Self::internal(message),
            DomainError::Storage { message } => Self::unavailable(message),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.status, self.response.error.error_type)
    }
}

impl std::error::Error for ApiError {}
