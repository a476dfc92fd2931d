//! Deadline Wrappers
//!
//! Wraps async operations in a deadline. On expiry the wrapped future is
//! dropped and never polled again: the caller stops waiting, it does not
//! cancel work already handed to a remote service.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::resilience::timeout::with_timeout;
//!
//! let url = with_timeout(
//!     Duration::from_secs(8),
//!     store.put(&name, bytes, options, &credential),
//!     "storage put",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{FlowError, Result};

/// Execute an async operation with a timeout
///
/// Returns `FlowError::Timeout` if the operation doesn't settle within
/// `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(FlowError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, FlowError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, FlowError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), FlowError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_inner_error_through() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Err::<u8, _>(FlowError::validation("source", "empty")) },
            "validate",
        )
        .await;
        assert!(matches!(result.unwrap_err(), FlowError::Validation(_)));
    }
}
