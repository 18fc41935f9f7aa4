//! Timeout helper for backend calls
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let text = with_timeout(timeout, async { /* relay call */ }, "relay call").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{DocflowError, Result};

/// Execute an async operation with a timeout
///
/// Returns `DocflowError::Timeout` if the operation doesn't complete in time.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(DocflowError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, DocflowError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, DocflowError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), DocflowError::Timeout { .. }));
    }
}
