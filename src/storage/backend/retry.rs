//! 数据库操作重试模块
//!
//! 只重试连接类错误（连接池耗尽、连接断开、超时），每次重试前重建连接；
//! 约束冲突等业务错误立即返回，不重试。

use sea_orm::DbErr;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 连接类错误的数据库错误码
///
/// - PostgreSQL: 08000/08001/08003/08004/08006 连接异常，53300 连接数耗尽，57P01 管理员断开
/// - MySQL: 1040 连接数过多，2002/2003 无法连接，2006 server gone away，2013 连接丢失
/// - SQLite: 5 BUSY，6 LOCKED
const CONNECTION_ERROR_CODES: &[&str] = &[
    "08000", "08001", "08003", "08004", "08006", "53300", "57P01", "1040", "2002", "2003", "2006",
    "2013", "5", "6",
];

/// 连接类错误的消息片段（回退方案）
const CONNECTION_ERROR_PATTERNS: &[&str] = &[
    "pool timed out",
    "timed out",
    "connection refused",
    "connection reset",
    "connection closed",
    "broken pipe",
    "too many connections",
    "server has gone away",
    "lost connection",
    "database is locked",
];

/// 判断数据库错误是否属于连接类（可重试）
pub fn is_retryable_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | // 连接池获取失败
        DbErr::Conn(_) => true, // 连接问题
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => {
            is_retryable_runtime_error(runtime_err)
        }
        _ => false,
    }
}

fn is_retryable_runtime_error(err: &sea_orm::error::RuntimeErr) -> bool {
    use sea_orm::error::RuntimeErr;

    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            if let Some(db_err) = sqlx_err.deref().as_database_error()
                && let Some(code) = db_err.code()
            {
                let code_str: &str = code.as_ref();
                return CONNECTION_ERROR_CODES.contains(&code_str);
            }
            is_retryable_error_message(&sqlx_err.to_string().to_lowercase())
        }
        RuntimeErr::Internal(msg) => is_retryable_error_message(&msg.to_lowercase()),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

fn is_retryable_error_message(err_str: &str) -> bool {
    CONNECTION_ERROR_PATTERNS
        .iter()
        .any(|pattern| err_str.contains(pattern))
}

/// 重试配置
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// 重试执行失败的原因
#[derive(Debug)]
pub enum RetryError {
    /// 最后一次尝试超时
    TimedOut { op: String, timeout_ms: u64 },
    /// 连接类错误，重试次数耗尽
    Exhausted(DbErr),
    /// 非连接类错误，未重试
    Fatal(DbErr),
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::TimedOut { op, timeout_ms } => {
                write!(f, "operation '{}' timed out after {}ms", op, timeout_ms)
            }
            RetryError::Exhausted(e) => write!(f, "retries exhausted: {}", e),
            RetryError::Fatal(e) => write!(f, "{}", e),
        }
    }
}

/// 带超时 + 重连的指数退避重试执行器
///
/// 每次尝试独立计时；连接类错误或超时在重试前先调用 `reconnect`，
/// 再按指数退避 + 抖动等待。
pub async fn with_retry_timeout<T, F, Fut, R, RFut>(
    operation_name: &str,
    config: RetryConfig,
    timeout_ms: u64,
    mut operation: F,
    mut reconnect: R,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
    R: FnMut() -> RFut,
    RFut: Future<Output = ()>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), operation()).await;

        let failure = match result {
            Ok(Ok(value)) => {
                if attempt > 0 {
                    debug!(
                        "Operation '{}' succeeded after {} retries",
                        operation_name, attempt
                    );
                }
                return Ok(value);
            }
            Ok(Err(e)) if is_retryable_error(&e) => {
                if attempt >= config.max_retries {
                    warn!(
                        "Operation '{}' failed, retries exhausted: {}",
                        operation_name, e
                    );
                    return Err(RetryError::Exhausted(e));
                }
                e.to_string()
            }
            Ok(Err(e)) => {
                debug!(
                    "Operation '{}' failed with non-retryable error: {}",
                    operation_name, e
                );
                return Err(RetryError::Fatal(e));
            }
            Err(_elapsed) => {
                if attempt >= config.max_retries {
                    warn!(
                        "Operation '{}' timed out after {}ms, retries exhausted",
                        operation_name, timeout_ms
                    );
                    return Err(RetryError::TimedOut {
                        op: operation_name.to_string(),
                        timeout_ms,
                    });
                }
                format!("timed out after {}ms", timeout_ms)
            }
        };

        attempt += 1;
        let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
        warn!(
            "Operation '{}' failed (attempt {}/{}): {}; reconnecting, retry in {} ms",
            operation_name,
            attempt,
            config.max_retries + 1,
            failure,
            delay
        );
        reconnect().await;
        sleep(Duration::from_millis(delay)).await;
    }
}

/// 计算指数退避延迟（带抖动）
fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exp_delay = base_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
    let capped = exp_delay.min(max_ms);
    // 0-25% 随机抖动
    let jitter = rand::random_range(0..=capped / 4);
    capped.saturating_add(jitter)
}
