//! SeaORM storage backend
//!
//! Database storage using SeaORM, supporting SQLite, MySQL/MariaDB, and
//! PostgreSQL. Every request-path operation goes through [`ResilientDb`].

mod analytics;
mod connection;
mod converters;
pub mod gate;
mod mutations;
mod query;
pub mod resilient;
pub mod retry;

use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::errors::{PixelRelayError, Result};
use crate::storage::models::StorageInfo;

pub use connection::{connect, connect_generic, connect_sqlite, run_migrations};
pub use gate::ConcurrencyGate;
pub use resilient::{ConnectTarget, ResilienceOptions, ResilientDb};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(PixelRelayError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 裸文件路径补全为 sqlite:// URL
fn normalize_sqlite_url(database_url: &str) -> String {
    if database_url.starts_with("sqlite://") || database_url == ":memory:" {
        database_url.to_string()
    } else {
        format!("sqlite://{}?mode=rwc", database_url)
    }
}

/// SeaORM-based storage backend
pub struct SeaOrmStorage {
    db: ResilientDb,
    backend_name: String,
}

impl SeaOrmStorage {
    pub async fn new(
        database_url: &str,
        backend_name: &str,
        pool_size: u32,
        options: ResilienceOptions,
    ) -> Result<Self> {
        if database_url.is_empty() {
            return Err(PixelRelayError::database_config("DATABASE_URL 未设置"));
        }

        let url = if backend_name == "sqlite" {
            normalize_sqlite_url(database_url)
        } else {
            database_url.to_string()
        };

        // 迁移使用独立连接；请求连接池在 schema 就绪后才建立，
        // 避免池中连接持有迁移前的 schema（SQLite 的 ON CONFLICT 目标解析依赖它）
        let migrator = connect(&url, backend_name, 1).await?;
        run_migrations(&migrator).await?;
        if let Err(e) = migrator.close().await {
            warn!("Failed to close migration connection: {}", e);
        }

        let conn = connect(&url, backend_name, pool_size).await?;

        let target = ConnectTarget {
            url,
            backend: backend_name.to_string(),
            pool_size,
        };
        let storage = SeaOrmStorage {
            db: ResilientDb::new(conn, Some(target), options),
            backend_name: backend_name.to_string(),
        };

        warn!(
            "{} Storage initialized (max {} concurrent operations).",
            storage.backend_name.to_uppercase(),
            options.max_concurrent
        );
        Ok(storage)
    }

    pub fn info(&self) -> StorageInfo {
        StorageInfo {
            storage_type: self.backend_name.clone(),
            max_concurrent: self.db.gate().max_concurrent(),
            in_flight: self.db.gate().in_flight(),
        }
    }

    /// 存活探测（不经过并发闸门）
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    pub fn resilient(&self) -> &ResilientDb {
        &self.db
    }

    /// 获取当前数据库连接（启动/关闭等非请求路径使用）
    pub fn get_db(&self) -> DatabaseConnection {
        self.db.connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://x.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("pixelrelay.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("mysql://u@h/db").unwrap(), "mysql");
        assert_eq!(infer_backend_from_url("mariadb://u@h/db").unwrap(), "mysql");
        assert_eq!(infer_backend_from_url("postgres://u@h/db").unwrap(), "postgres");
        assert!(infer_backend_from_url("redis://h").is_err());
    }

    #[test]
    fn test_normalize_sqlite_url() {
        assert_eq!(normalize_sqlite_url("data.db"), "sqlite://data.db?mode=rwc");
        assert_eq!(normalize_sqlite_url("sqlite://a.db"), "sqlite://a.db");
    }
}
