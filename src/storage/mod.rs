use std::sync::Arc;

use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::SeaOrmStorage;
pub use models::{
    AnalyticsSession, CustomData, CustomEventMapping, DailyStat, Event, NewPixelApp, PixelApp,
    PixelSettings, StatDelta, StorageInfo,
};

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create() -> Result<Arc<SeaOrmStorage>> {
        let config = crate::config::get_config();
        let db_config = &config.database;

        // 从 URL 自动推断数据库类型
        let backend_type = backend::infer_backend_from_url(&db_config.database_url)?;

        let storage = SeaOrmStorage::new(
            &db_config.database_url,
            &backend_type,
            db_config.pool_size,
            backend::ResilienceOptions::from_config(db_config),
        )
        .await?;
        Ok(Arc::new(storage))
    }
}
