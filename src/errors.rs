use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error interacting with an external collaborator.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Invalid wiring or settings detected at construction time.
    Config(String),
    /// A single external call exceeded its deadline.
    Timeout {
        /// Name of the call that timed out.
        operation: String,
        /// Deadline that was exceeded, in milliseconds.
        after_ms: u64,
    },
    /// Every qualification backend failed; no qualification score exists for the run.
    Synthesis(String),
    /// The authoritative structured-store write failed; nothing was persisted.
    Persistence(String),
    /// A top-level pipeline stage ran past its deadline.
    StageTimeout {
        /// The stage that was cancelled.
        stage: &'static str,
    },
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Name of the fatal pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            AppError::Synthesis(_) => Some("insight"),
            AppError::Persistence(_) => Some("persist"),
            AppError::StageTimeout { stage } => Some(*stage),
            AppError::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }

    /// True when the error came from an exceeded deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            AppError::Timeout { .. } | AppError::StageTimeout { .. } => true,
            AppError::WithContext { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Timeout {
                operation,
                after_ms,
            } => write!(f, "Timeout: {} exceeded {}ms", operation, after_ms),
            AppError::Synthesis(msg) => write!(f, "Insight synthesis failed: {}", msg),
            AppError::Persistence(msg) => write!(f, "Persistence failed: {}", msg),
            AppError::StageTimeout { stage } => {
                write!(f, "Pipeline stage '{}' exceeded its deadline", stage)
            }
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Pipeline-level failures carry the name of the stage that failed.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::InternalError(msg) | AppError::Config(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Timeout { .. } | AppError::StageTimeout { .. } => {
                tracing::error!("{}", self);
                (StatusCode::GATEWAY_TIMEOUT, self.to_string())
            }
            AppError::Synthesis(_) => {
                tracing::error!("{}", self);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Persistence(_) => {
                tracing::error!("{}", self);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
            "stage": self.stage(),
        }));

        (status, body).into_response()
    }
}

// Make AppError cloneable for WithContext variant
impl Clone for AppError {
    /// Clones the error.
    ///
    /// Note: `sqlx::Error` is not cloneable, so `DatabaseError` is simplified to `RowNotFound` during cloning.
    fn clone(&self) -> Self {
        match self {
            AppError::DatabaseError(_e) => AppError::DatabaseError(sqlx::Error::RowNotFound), // Simplified clone
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::ExternalApiError(msg) => AppError::ExternalApiError(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::Config(msg) => AppError::Config(msg.clone()),
            AppError::Timeout {
                operation,
                after_ms,
            } => AppError::Timeout {
                operation: operation.clone(),
                after_ms: *after_ms,
            },
            AppError::Synthesis(msg) => AppError::Synthesis(msg.clone()),
            AppError::Persistence(msg) => AppError::Persistence(msg.clone()),
            AppError::StageTimeout { stage } => AppError::StageTimeout { stage: *stage },
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON error: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_fatal_errors() {
        assert_eq!(AppError::Synthesis("x".into()).stage(), Some("insight"));
        assert_eq!(AppError::Persistence("x".into()).stage(), Some("persist"));
        assert_eq!(
            AppError::StageTimeout { stage: "intent" }.stage(),
            Some("intent")
        );
        assert_eq!(AppError::NotFound("x".into()).stage(), None);
    }

    #[test]
    fn test_context_preserves_stage() {
        let err: Result<(), AppError> = Err(AppError::Persistence("db down".into()));
        let wrapped = err.context("writing composite record").unwrap_err();

        assert_eq!(wrapped.stage(), Some("persist"));
        assert!(wrapped.to_string().starts_with("writing composite record: "));
    }

    #[test]
    fn test_timeout_detection() {
        let err = AppError::Timeout {
            operation: "apollo".into(),
            after_ms: 50,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout: apollo exceeded 50ms");
        assert!(!AppError::BadRequest("x".into()).is_timeout());
    }
}
