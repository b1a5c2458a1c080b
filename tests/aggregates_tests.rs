//! 会话与天级统计的并发一致性测试

mod common;

use chrono::Utc;
use futures_util::future::join_all;
use sea_orm::ConnectionTrait;

use common::TestEnv;
use pixelrelay::services::{ClientContext, TrackRequest};

fn pageview(app_id: i64, session: &str, fingerprint: &str) -> TrackRequest {
    serde_json::from_value(serde_json::json!({
        "appId": app_id,
        "eventName": "page_view",
        "url": "https://mystore.com/",
        "sessionId": session,
        "fingerprint": fingerprint
    }))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pageviews_converge() {
    const N: usize = 24;

    let env = TestEnv::new().await;
    let pixel = env.seed_app("pk_store", Some("mystore.com"), true).await;

    let tasks = (0..N).map(|_| {
        let tracking = env.services.tracking.clone();
        let request = pageview(pixel.id, "s-shared", "fp-shared");
        tokio::spawn(async move {
            tracking
                .track(None, request, ClientContext::default())
                .await
                .map(|outcome| outcome.response.event_id)
        })
    });

    let results = join_all(tasks).await;
    for result in results {
        result.expect("任务 panic").expect("track 失败");
    }

    let session = env
        .storage
        .get_session("s-shared")
        .await
        .unwrap()
        .expect("会话不存在");
    assert_eq!(session.pageviews, N as i64);

    let today = Utc::now().date_naive();
    let stats = env.storage.daily_stats_since(pixel.id, today).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].pageviews, N as i64);
    assert_eq!(stats[0].events, N as i64);
    assert_eq!(stats[0].sessions, 1);
    assert_eq!(stats[0].unique_users, 1);

    assert_eq!(env.storage.count_events(pixel.id).await.unwrap(), N as u64);
}

#[tokio::test]
async fn test_repeat_session_accumulates_on_one_row() {
    let env = TestEnv::new().await;
    let pixel = env.seed_app("pk_store", Some("mystore.com"), true).await;

    for _ in 0..2 {
        env.services
            .tracking
            .track(None, pageview(pixel.id, "s1", "fp-1"), ClientContext::default())
            .await
            .unwrap();
    }

    let session = env.storage.get_session("s1").await.unwrap().unwrap();
    assert_eq!(session.pageviews, 2);
    assert!(session.last_seen >= session.first_seen);

    let today = Utc::now().date_naive();
    let stats = env.storage.daily_stats_since(pixel.id, today).await.unwrap();
    assert_eq!(stats[0].sessions, 1);
    assert_eq!(stats[0].pageviews, 2);
    assert_eq!(stats[0].unique_users, 1);
}

#[tokio::test]
async fn test_non_pageview_events_count_as_events_only() {
    let env = TestEnv::new().await;
    let pixel = env.seed_app("pk_store", Some("mystore.com"), true).await;

    let request: TrackRequest = serde_json::from_value(serde_json::json!({
        "appId": pixel.id,
        "eventName": "product_added_to_cart",
        "url": "https://mystore.com/products/x",
        "sessionId": "s2"
    }))
    .unwrap();
    env.services
        .tracking
        .track(None, request, ClientContext::default())
        .await
        .unwrap();

    let session = env.storage.get_session("s2").await.unwrap().unwrap();
    assert_eq!(session.pageviews, 0);

    let today = Utc::now().date_naive();
    let stats = env.storage.daily_stats_since(pixel.id, today).await.unwrap();
    assert_eq!(stats[0].pageviews, 0);
    assert_eq!(stats[0].events, 1);
    assert_eq!(stats[0].sessions, 1);
    assert_eq!(stats[0].unique_users, 0);
}

#[tokio::test]
async fn test_distinct_fingerprints_are_distinct_users() {
    let env = TestEnv::new().await;
    let pixel = env.seed_app("pk_store", Some("mystore.com"), true).await;

    for (session, fp) in [("a", "fp-a"), ("b", "fp-b"), ("c", "fp-a")] {
        env.services
            .tracking
            .track(None, pageview(pixel.id, session, fp), ClientContext::default())
            .await
            .unwrap();
    }

    let today = Utc::now().date_naive();
    let stats = env.storage.daily_stats_since(pixel.id, today).await.unwrap();
    assert_eq!(stats[0].unique_users, 2);
    assert_eq!(stats[0].sessions, 3);
}

#[tokio::test]
async fn test_counters_survive_failed_visitor_check() {
    let env = TestEnv::new().await;
    let pixel = env.seed_app("pk_store", Some("mystore.com"), true).await;

    // 去重表不可用时，独立用户判定失败
    env.storage
        .get_db()
        .execute_unprepared("DROP TABLE daily_visitors")
        .await
        .unwrap();

    env.services
        .tracking
        .track(None, pageview(pixel.id, "s-lost", "fp-lost"), ClientContext::default())
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let stats = env.storage.daily_stats_since(pixel.id, today).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].pageviews, 1);
    assert_eq!(stats[0].events, 1);
    assert_eq!(stats[0].sessions, 1);
    assert_eq!(stats[0].unique_users, 0);
}
