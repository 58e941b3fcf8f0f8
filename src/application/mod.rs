//! Application layer: the four services of the engine and the `Engine` that
//! wires them to one storage backend.
//!
//! Every store round trip goes through [`bounded`], so a slow or wedged
//! backend surfaces as a retryable [`EngineError::Timeout`] instead of a
//! hung request. Multi-row changes run inside one serializable `StoreTx`;
//! an error anywhere drops the transaction and rolls it back.

pub mod bookings;
pub mod engine;
#[cfg(test)]
mod fixtures;
pub mod payments;
pub mod sessions;
pub mod slots;

pub use engine::Engine;

use crate::error::{EngineError, Result};
use std::future::Future;
use std::time::Duration;

pub(crate) async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let value = bounded(Duration::from_secs(1), async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert!(result.unwrap_err().is_retryable());
    }
}
