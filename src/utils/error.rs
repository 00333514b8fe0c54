use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Store unavailable or query failure. Retriable.
    Store(String),
    /// Uniqueness violation reported by the store.
    Conflict(String),
    /// Identity provider, discovery or token failure.
    Identity(String),
    InvalidRequest(String),
    Unauthorized(String),
    Config(String),
}

impl AppError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, AppError::Store(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Store(msg) => write!(f, "Store error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Identity(msg) => write!(f, "Identity provider error: {}", msg),
            AppError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Identity(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Identity(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if self.is_retriable() {
            builder.insert_header(("Retry-After", "5"));
        }
        builder.json(serde_json::json!({
            "success": false,
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_retriable_503() {
        let err = AppError::Store("connection refused".to_string());
        assert!(err.is_retriable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let res = err.error_response();
        assert_eq!(res.headers().get("Retry-After").unwrap(), "5");
    }

    #[test]
    fn data_errors_are_not_retriable() {
        let err = AppError::InvalidRequest("payout detail is required".to_string());
        assert!(!err.is_retriable());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.error_response().headers().get("Retry-After").is_none());
    }

    #[test]
    fn identity_errors_map_to_bad_gateway() {
        let err = AppError::Identity("discovery failed".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Identity provider error: discovery failed");
    }
}
