//! Session and daily aggregate updates
//!
//! Runs after the event row is written. Failures here never fail the
//! request: the event table is the source of truth and the aggregates can
//! lag behind it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::storage::{Event, SeaOrmStorage, StatDelta};

/// 规范的 pageview 事件名
pub const PAGEVIEW_EVENT: &str = "page_view";

pub fn is_pageview(event_name: &str) -> bool {
    matches!(event_name, PAGEVIEW_EVENT | "PageView" | "page_viewed")
}

/// 一次事件对会话与天级统计的影响
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub new_session: bool,
    pub delta: StatDelta,
}

#[derive(Clone)]
pub struct AggregateUpdater {
    storage: Arc<SeaOrmStorage>,
}

impl AggregateUpdater {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// 更新会话与当天统计；会话或计数器写入失败向上返回
    pub async fn apply(&self, event: &Event) -> Result<AggregateOutcome> {
        let now = Utc::now();
        let pageview = is_pageview(&event.event_name);

        let new_session = match event.session_id.as_deref() {
            Some(sid) if !sid.is_empty() => {
                self.storage
                    .record_session(sid, event.pixel_app_id, i64::from(pageview), now)
                    .await?
            }
            _ => false,
        };

        let day = event.created_at.date_naive();
        // 独立用户判定失败只影响 unique_users，其余计数照常累加
        let new_visitor = match event.fingerprint.as_deref() {
            Some(fp) if !fp.is_empty() => self
                .storage
                .mark_daily_visitor(event.pixel_app_id, day, fp, now)
                .await
                .unwrap_or_else(|e| {
                    warn!(
                        "Unique visitor check for event {} (app {}) failed: {}",
                        event.id, event.pixel_app_id, e
                    );
                    false
                }),
            _ => false,
        };

        let delta = StatDelta {
            pageviews: i64::from(pageview),
            unique_users: i64::from(new_visitor),
            sessions: i64::from(new_session),
            events: 1,
        };

        self.storage
            .bump_daily_stat(event.pixel_app_id, day, delta, now)
            .await?;

        debug!(
            "Aggregates updated for event {} (new_session={}, delta={:?})",
            event.id, new_session, delta
        );
        Ok(AggregateOutcome { new_session, delta })
    }

    /// 同 [`apply`](Self::apply)，失败只记日志
    pub async fn record(&self, event: &Event) -> Option<AggregateOutcome> {
        match self.apply(event).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(
                    "Aggregate update for event {} (app {}) failed: {}",
                    event.id, event.pixel_app_id, e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pageview_aliases() {
        assert!(is_pageview("page_view"));
        assert!(is_pageview("PageView"));
        assert!(is_pageview("page_viewed"));
        assert!(!is_pageview("product_viewed"));
        assert!(!is_pageview("PAGE_VIEW"));
    }
}
