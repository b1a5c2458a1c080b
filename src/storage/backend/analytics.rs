//! 会话与天级统计的原子写入
//!
//! 计数器只通过数据库端的 `col = col + delta` 更新，不做读-改-写，
//! 并发请求下的结果与串行执行一致。

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, DatabaseBackend, DbErr, EntityTrait, ExprTrait, QueryFilter,
    sea_query::{Expr, OnConflict},
};

use super::SeaOrmStorage;
use crate::errors::Result;
use crate::storage::models::StatDelta;

use migration::entities::{analytics_session, daily_stat, daily_visitor};

/// 按后端生成计数器累加子句
///
/// SQLite/PostgreSQL: col = col + excluded.col
/// MySQL: col = col + VALUES(col)
fn counter_on_conflict(backend: DatabaseBackend) -> OnConflict {
    let incoming = |name: &str| match backend {
        DatabaseBackend::MySql => Expr::cust(format!("VALUES({})", name)),
        _ => Expr::cust(format!("excluded.{}", name)),
    };

    OnConflict::columns([daily_stat::Column::PixelAppId, daily_stat::Column::Day])
        .value(
            daily_stat::Column::Pageviews,
            Expr::col(daily_stat::Column::Pageviews).add(incoming("pageviews")),
        )
        .value(
            daily_stat::Column::UniqueUsers,
            Expr::col(daily_stat::Column::UniqueUsers).add(incoming("unique_users")),
        )
        .value(
            daily_stat::Column::Sessions,
            Expr::col(daily_stat::Column::Sessions).add(incoming("sessions")),
        )
        .value(
            daily_stat::Column::Events,
            Expr::col(daily_stat::Column::Events).add(incoming("events")),
        )
        .value(daily_stat::Column::UpdatedAt, incoming("updated_at"))
        .to_owned()
}

impl SeaOrmStorage {
    /// 记录一次会话活动
    ///
    /// 会话不存在时创建（pageviews 为 `pageview_delta`），返回 true；
    /// 已存在时原子累加 pageviews 并刷新 last_seen，返回 false。
    ///
    /// 两条语句各自原子：INSERT .. DO NOTHING 决定由哪个请求开启会话
    /// （新会话计数依赖这一点），UPDATE 用 `pageviews = pageviews + ?` 累加。
    /// 语句间不做读-改-写，并发结果与串行一致。
    ///
    /// 注意：UPDATE 已提交但超时后被重试时，同一 pageview 会被累加两次；
    /// 聚合是尽力而为，以 events 表为准。
    pub async fn record_session(
        &self,
        session_id: &str,
        pixel_app_id: i64,
        pageview_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let sid = session_id.to_string();

        self.db
            .run("record_session", |db| {
                let sid = sid.clone();
                async move {
                    let active = analytics_session::ActiveModel {
                        session_id: Set(sid.clone()),
                        pixel_app_id: Set(pixel_app_id),
                        pageviews: Set(pageview_delta),
                        first_seen: Set(now),
                        last_seen: Set(now),
                        ..Default::default()
                    };

                    let inserted = match analytics_session::Entity::insert(active)
                        .on_conflict(
                            OnConflict::column(analytics_session::Column::SessionId)
                                .do_nothing()
                                .to_owned(),
                        )
                        .exec_without_returning(&db)
                        .await
                    {
                        Ok(rows) => rows > 0,
                        Err(DbErr::RecordNotInserted) => false,
                        Err(e) => return Err(e),
                    };

                    if inserted {
                        return Ok(true);
                    }

                    analytics_session::Entity::update_many()
                        .col_expr(
                            analytics_session::Column::Pageviews,
                            Expr::col(analytics_session::Column::Pageviews)
                                .add(Expr::val(pageview_delta)),
                        )
                        .col_expr(analytics_session::Column::LastSeen, Expr::value(now))
                        .filter(analytics_session::Column::SessionId.eq(sid))
                        .exec(&db)
                        .await?;

                    Ok(false)
                }
            })
            .await
    }

    /// 原子累加天级统计；空增量直接返回
    pub async fn bump_daily_stat(
        &self,
        pixel_app_id: i64,
        day: NaiveDate,
        delta: StatDelta,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if delta == StatDelta::default() {
            return Ok(());
        }

        let backend = self.db.connection().get_database_backend();
        let on_conflict = counter_on_conflict(backend);

        self.db
            .run("bump_daily_stat", |db| {
                let on_conflict = on_conflict.clone();
                async move {
                    let active = daily_stat::ActiveModel {
                        pixel_app_id: Set(pixel_app_id),
                        day: Set(day),
                        pageviews: Set(delta.pageviews),
                        unique_users: Set(delta.unique_users),
                        sessions: Set(delta.sessions),
                        events: Set(delta.events),
                        updated_at: Set(now),
                        ..Default::default()
                    };

                    daily_stat::Entity::insert(active)
                        .on_conflict(on_conflict)
                        .exec_without_returning(&db)
                        .await
                }
            })
            .await?;

        Ok(())
    }

    /// 登记当天访客；(pixel_app_id, day, fingerprint) 首次出现返回 true
    ///
    /// 依赖唯一索引做插入去重，并发下同一访客只会有一条插入成功。
    pub async fn mark_daily_visitor(
        &self,
        pixel_app_id: i64,
        day: NaiveDate,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let fingerprint = fingerprint.to_string();

        self.db
            .run("mark_daily_visitor", |db| {
                let active = daily_visitor::ActiveModel {
                    pixel_app_id: Set(pixel_app_id),
                    day: Set(day),
                    fingerprint: Set(fingerprint.clone()),
                    first_seen: Set(now),
                    ..Default::default()
                };
                async move {
                    match daily_visitor::Entity::insert(active)
                        .on_conflict(
                            OnConflict::columns([
                                daily_visitor::Column::PixelAppId,
                                daily_visitor::Column::Day,
                                daily_visitor::Column::Fingerprint,
                            ])
                            .do_nothing()
                            .to_owned(),
                        )
                        .exec_without_returning(&db)
                        .await
                    {
                        Ok(rows) => Ok(rows > 0),
                        Err(DbErr::RecordNotInserted) => Ok(false),
                        Err(e) => Err(e),
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::QueryTrait;

    #[test]
    fn test_counter_on_conflict_sqlite_uses_excluded() {
        let active = daily_stat::ActiveModel {
            pixel_app_id: Set(1),
            day: Set(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()),
            pageviews: Set(1),
            unique_users: Set(0),
            sessions: Set(0),
            events: Set(1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        let sql = daily_stat::Entity::insert(active)
            .on_conflict(counter_on_conflict(DatabaseBackend::Sqlite))
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains("excluded.pageviews"));
        assert!(sql.contains("excluded.unique_users"));
        assert!(!sql.contains("VALUES(pageviews)"));
    }
}
