//! 带并发闸门、超时与重连重试的数据库访问封装
//!
//! 所有请求路径上的数据库操作都通过 [`ResilientDb::run`] 执行：
//! 1. 先在 [`ConcurrencyGate`] 排队取得许可（排队超时 → QueueTimeout）
//! 2. 每次尝试与计时器竞速（超时 → OperationTimeout）
//! 3. 连接类错误 / 超时：重建连接后指数退避重试；其他错误立即返回
//!
//! [`ResilientDb::ping`] 是独立的存活探测，不经过闸门，供启动和健康检查使用。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use sea_orm::{DatabaseConnection, DbErr};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::connection;
use super::gate::ConcurrencyGate;
use super::retry::{self, RetryConfig, RetryError};
use crate::config::DatabaseConfig;
use crate::errors::{PixelRelayError, Result};

/// 重连所需的连接参数
#[derive(Clone, Debug)]
pub struct ConnectTarget {
    pub url: String,
    pub backend: String,
    pub pool_size: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct ResilienceOptions {
    pub max_concurrent: usize,
    pub queue_timeout: Duration,
    pub operation_timeout: Duration,
    pub retry: RetryConfig,
}

impl ResilienceOptions {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            queue_timeout: Duration::from_millis(config.queue_timeout_ms),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
            retry: RetryConfig {
                max_retries: config.retry_count,
                base_delay_ms: config.retry_base_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
        }
    }
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        Self::from_config(&DatabaseConfig::default())
    }
}

pub struct ResilientDb {
    conn: ArcSwap<DatabaseConnection>,
    target: Option<ConnectTarget>,
    gate: ConcurrencyGate,
    options: ResilienceOptions,
    reconnect_lock: Mutex<()>,
}

impl ResilientDb {
    pub fn new(
        db: DatabaseConnection,
        target: Option<ConnectTarget>,
        options: ResilienceOptions,
    ) -> Self {
        Self {
            conn: ArcSwap::from_pointee(db),
            target,
            gate: ConcurrencyGate::new(options.max_concurrent, options.queue_timeout),
            options,
            reconnect_lock: Mutex::new(()),
        }
    }

    /// 当前连接（廉价 clone，内部为连接池句柄）
    pub fn connection(&self) -> DatabaseConnection {
        self.conn.load_full().as_ref().clone()
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// 在闸门、超时与重试保护下执行数据库操作
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(DatabaseConnection) -> Fut,
        Fut: Future<Output = std::result::Result<T, DbErr>>,
    {
        let _permit = self.gate.acquire(op_name).await?;

        let timeout_ms = self.options.operation_timeout.as_millis() as u64;
        retry::with_retry_timeout(
            op_name,
            self.options.retry,
            timeout_ms,
            || operation(self.connection()),
            || self.reconnect(),
        )
        .await
        .map_err(|e| match e {
            RetryError::TimedOut { op, timeout_ms } => PixelRelayError::operation_timeout(format!(
                "'{}' exceeded {}ms",
                op, timeout_ms
            )),
            RetryError::Exhausted(db_err) => PixelRelayError::transient_infra(format!(
                "'{}' failed after retries: {}",
                op_name, db_err
            )),
            RetryError::Fatal(db_err) => PixelRelayError::database_operation(format!(
                "'{}' failed: {}",
                op_name, db_err
            )),
        })
    }

    /// 存活探测（不经过闸门）
    pub async fn ping(&self) -> Result<()> {
        let db = self.connection();
        match tokio::time::timeout(self.options.operation_timeout, db.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PixelRelayError::database_connection(format!(
                "ping failed: {}",
                e
            ))),
            Err(_) => Err(PixelRelayError::operation_timeout(format!(
                "ping exceeded {}ms",
                self.options.operation_timeout.as_millis()
            ))),
        }
    }

    /// 重建连接池并原子替换
    async fn reconnect(&self) {
        let Some(target) = self.target.as_ref() else {
            return;
        };

        // 并发失败的调用者只需要一次重连
        let Ok(_guard) = self.reconnect_lock.try_lock() else {
            return;
        };

        match connection::connect(&target.url, &target.backend, target.pool_size).await {
            Ok(db) => {
                self.conn.store(Arc::new(db));
                info!("{} connection pool rebuilt", target.backend.to_uppercase());
            }
            Err(e) => {
                warn!("Reconnect to {} failed: {}", target.backend, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn sqlite_db() -> (ResilientDb, tempfile::TempDir) {
        let td = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", td.path().join("r.db").display());
        let db = connection::connect_sqlite(&url).await.unwrap();
        let options = ResilienceOptions {
            max_concurrent: 1,
            queue_timeout: Duration::from_millis(50),
            operation_timeout: Duration::from_millis(200),
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 5,
                max_delay_ms: 10,
            },
        };
        let target = ConnectTarget {
            url,
            backend: "sqlite".to_string(),
            pool_size: 1,
        };
        (ResilientDb::new(db, Some(target), options), td)
    }

    #[tokio::test]
    async fn test_ping() {
        let (db, _td) = sqlite_db().await;
        assert!(db.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_fatal_error_propagates_without_retry() {
        let (db, _td) = sqlite_db().await;
        let calls = AtomicU32::new(0);

        let err = db
            .run("fatal_op", |_conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DbErr::Custom("constraint violated".to_string())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PixelRelayError::DatabaseOperation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_errors_exhaust_into_transient() {
        let (db, _td) = sqlite_db().await;
        let calls = AtomicU32::new(0);

        let err = db
            .run("flaky_op", |_conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(DbErr::ConnectionAcquire(
                        sea_orm::error::ConnAcquireErr::Timeout,
                    ))
                }
            })
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 重连后仍可用
        assert!(db.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_saturated_gate_yields_queue_timeout() {
        let (db, _td) = sqlite_db().await;
        let db = Arc::new(db);

        let holder = {
            let db = db.clone();
            tokio::spawn(async move {
                db.run("holder", |_conn| async {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok::<_, DbErr>(())
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = db
            .run("waiter", |_conn| async { Ok::<_, DbErr>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, PixelRelayError::QueueTimeout(_)));

        assert!(holder.await.unwrap().is_ok());
    }
}
