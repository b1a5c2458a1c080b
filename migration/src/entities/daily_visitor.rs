//! 天级访客去重，(pixel_app_id, day, fingerprint) 唯一

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "daily_visitors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pixel_app_id: i64,
    pub day: Date,
    pub fingerprint: String,
    pub first_seen: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
