use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "custom_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pixel_app_id: i64,
    /// 内部事件名
    pub name: String,
    /// 映射到的外部标准事件名
    pub meta_event_name: String,
    /// 默认 custom_data（JSON object）
    #[sea_orm(column_type = "Text", nullable)]
    pub default_data: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
