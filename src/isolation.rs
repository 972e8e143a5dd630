//! Per-call failure isolation shared by every waterfall and fan-out point.
//!
//! Each external call runs under its own deadline. Both an error and an expired
//! deadline come back as a [`SourceFailure`] value instead of propagating, so the
//! caller decides whether the failure matters.

use crate::errors::AppError;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// A single collaborator call that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Name of the collaborator (source, provider, backend, channel or store).
    pub source: String,
    pub cause: String,
    pub timed_out: bool,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.source, self.cause)
    }
}

impl From<SourceFailure> for AppError {
    fn from(failure: SourceFailure) -> Self {
        AppError::ExternalApiError(failure.to_string())
    }
}

/// Runs `call` under `timeout`, converting errors and timeouts into [`SourceFailure`].
pub async fn guarded<T, F>(
    collaborator: &str,
    timeout: Duration,
    call: F,
) -> Result<T, SourceFailure>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            let timed_out = e.is_timeout();
            Err(SourceFailure {
                source: collaborator.to_string(),
                cause: e.to_string(),
                timed_out,
            })
        }
        Err(_) => Err(SourceFailure {
            source: collaborator.to_string(),
            cause: AppError::Timeout {
                operation: collaborator.to_string(),
                after_ms: timeout.as_millis() as u64,
            }
            .to_string(),
            timed_out: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = guarded("apollo", Duration::from_secs(1), async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let result: Result<(), _> = guarded("clay", Duration::from_secs(1), async {
            Err(AppError::ExternalApiError("HTTP 503".into()))
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.source, "clay");
        assert!(failure.cause.contains("HTTP 503"));
        assert!(!failure.timed_out);
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure() {
        let result: Result<(), _> = guarded("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let failure = result.unwrap_err();
        assert!(failure.timed_out);
        assert_eq!(failure.cause, "Timeout: slow exceeded 10ms");
    }
}
