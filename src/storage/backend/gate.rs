//! 数据库并发闸门
//!
//! 限制同时执行的数据库操作数量。超出上限的调用者排队等待，
//! 等待超过 `queue_timeout` 后返回错误，而不是无限期阻塞。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::errors::{PixelRelayError, Result};

#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    queue_timeout: Duration,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize, queue_timeout: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue_timeout,
        }
    }

    /// 获取执行许可；permit drop 时自动归还
    pub async fn acquire(&self, op_name: &str) -> Result<OwnedSemaphorePermit> {
        match tokio::time::timeout(self.queue_timeout, self.semaphore.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(PixelRelayError::transient_infra(format!(
                "concurrency gate closed while '{}' was queued",
                op_name
            ))),
            Err(_elapsed) => {
                warn!(
                    "Operation '{}' waited {:?} for a database slot ({} in flight), giving up",
                    op_name,
                    self.queue_timeout,
                    self.in_flight()
                );
                Err(PixelRelayError::queue_timeout(format!(
                    "'{}' queued longer than {}ms",
                    op_name,
                    self.queue_timeout.as_millis()
                )))
            }
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_within_limit() {
        let gate = ConcurrencyGate::new(2, Duration::from_millis(50));
        let a = gate.acquire("a").await.unwrap();
        let b = gate.acquire("b").await.unwrap();
        assert_eq!(gate.in_flight(), 2);
        drop(a);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_queue_timeout_when_saturated() {
        let gate = ConcurrencyGate::new(1, Duration::from_millis(30));
        let _held = gate.acquire("holder").await.unwrap();

        let err = gate.acquire("waiter").await.unwrap_err();
        assert!(matches!(err, PixelRelayError::QueueTimeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_queued_caller_proceeds_after_release() {
        let gate = ConcurrencyGate::new(1, Duration::from_millis(500));
        let held = gate.acquire("holder").await.unwrap();

        let gate_clone = gate.clone();
        let waiter = tokio::spawn(async move { gate_clone.acquire("waiter").await.is_ok() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let gate = ConcurrencyGate::new(0, Duration::from_millis(10));
        assert_eq!(gate.max_concurrent(), 1);
    }
}
