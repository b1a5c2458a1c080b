use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "pixel_apps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 前端 snippet 携带的公开 ID
    #[sea_orm(unique)]
    pub app_key: String,
    pub name: String,
    pub enabled: bool,
    /// 绑定的网站域名（最多一个，已规范化）
    pub website_domain: Option<String>,
    /// 所属店铺（xxx.myshopify.com）
    pub shop: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
