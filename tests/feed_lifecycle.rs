//! Integration tests for the feed lifecycle: add, sync, list, delete.
//!
//! Each test creates its own in-memory SQLite database and wiremock server.
//! These tests drive the public `FeedEngine` API end to end.

use std::time::Duration;

use feedsync::feed::{SyncError, SyncOutcome, SyncSettings};
use feedsync::icon::{IconSettings, GENERIC_ICON};
use feedsync::storage::{Database, FeedRef, ItemFilter, NewFeed};
use feedsync::FeedEngine;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const T: i64 = 1_704_067_200_000;

fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(link, date)| {
            format!("<item><title>{link}</title><link>{link}</link><pubDate>{date}</pubDate></item>")
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Mock Feed</title>{body}</channel></rss>"#)
}

async fn test_engine(server: &MockServer) -> (Database, FeedEngine) {
    let db = Database::open(":memory:").await.unwrap();
    let engine = FeedEngine::new(
        db.clone(),
        reqwest::Client::new(),
        SyncSettings {
            fetch_timeout: Duration::from_secs(5),
            allow_private_hosts: true,
            ..SyncSettings::default()
        },
        IconSettings {
            service_url: format!("{}/favicons?domain={{domain}}", server.uri()),
            timeout: Duration::from_secs(2),
            icon_dir: None,
        },
    );
    (db, engine)
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_icon(server: &MockServer, bytes: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path("/favicons"))
        .and(query_param("domain", "127.0.0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

// ============================================================================
// Add Feed Tests
// ============================================================================

#[tokio::test]
async fn test_add_feed_syncs_and_fetches_icon() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/rss",
        rss(&[
            ("https://example.com/1", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("https://example.com/2", "Mon, 01 Jan 2024 01:00:00 GMT"),
            ("https://example.com/3", "Mon, 01 Jan 2024 02:00:00 GMT"),
        ]),
    )
    .await;
    mount_icon(&server, b"icon").await;
    let (db, engine) = test_engine(&server).await;

    let url = format!("{}/rss", server.uri());
    let feed = engine.add_feed_at(&url, T + 10_800_000).await.unwrap();

    assert_eq!(feed.url, url);
    assert_eq!(feed.title, "Mock Feed");
    assert_eq!(feed.domain, "127.0.0.1");
    assert_eq!(feed.last_check, T + 10_800_000);
    assert_eq!(feed.last_update, T + 7_200_000);
    assert_eq!(feed.poll_interval, 600_000);

    let items = engine.get_items(&ItemFilter::default()).await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.feed_id == feed.id));

    assert_eq!(db.get_icon("127.0.0.1").await.unwrap().unwrap().data, b"icon");
    assert_eq!(engine.get_icon("127.0.0.1").await, b"icon");
}

#[tokio::test]
async fn test_add_same_url_twice_returns_same_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[])))
        .expect(1)
        .mount(&server)
        .await;
    let (db, engine) = test_engine(&server).await;
    let url = format!("{}/rss", server.uri());

    let first = engine.add_feed(&url).await.unwrap();
    let second = engine.add_feed(&url).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(db.list_feed_ids().await.unwrap(), vec![first.id]);
}

#[tokio::test]
async fn test_add_unreachable_feed_keeps_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let (db, engine) = test_engine(&server).await;
    let url = format!("{}/gone", server.uri());

    let result = engine.add_feed_at(&url, T).await;
    match result {
        Err(SyncError::Unreachable { url: failed, .. }) => assert_eq!(failed, url),
        other => panic!("expected Unreachable, got {other:?}"),
    }

    let feed = db.get_feed_by_url(&url).await.unwrap().unwrap();
    assert_eq!(feed.last_check, T);
    assert_eq!(feed.last_update, 0);
}

#[tokio::test]
async fn test_concurrent_adds_share_one_row() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/rss",
        rss(&[
            ("https://example.com/1", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("https://example.com/2", "Mon, 01 Jan 2024 01:00:00 GMT"),
        ]),
    )
    .await;
    let (db, engine) = test_engine(&server).await;
    let url = format!("{}/rss", server.uri());

    let (first, second) = tokio::join!(engine.add_feed(&url), engine.add_feed(&url));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.id, second.id);
    assert_eq!(db.list_feed_ids().await.unwrap(), vec![first.id]);
    assert_eq!(engine.get_items(&ItemFilter::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_sync_by_padded_url_after_add() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss", rss(&[])).await;
    let (db, engine) = test_engine(&server).await;
    let url = format!("{}/rss", server.uri());
    let feed = engine.add_feed_at(&url, T).await.unwrap();

    let outcome = engine
        .sync_feed_at(&FeedRef::Url(format!(" {url} ")), true, T + 1_000)
        .await
        .unwrap();

    assert_eq!(outcome.feed_id(), feed.id);
    assert_eq!(db.list_feed_ids().await.unwrap(), vec![feed.id]);
    assert_eq!(
        db.get_feed_by_id(feed.id).await.unwrap().unwrap().last_check,
        T + 1_000
    );
}

#[tokio::test]
async fn test_add_rejects_bad_urls() {
    let server = MockServer::start().await;
    let (db, engine) = test_engine(&server).await;

    for bad in ["not a url", "ftp://example.com/feed", "file:///etc/passwd"] {
        let result = engine.add_feed(bad).await;
        assert!(
            matches!(result, Err(SyncError::InvalidUrl(_))),
            "{bad} should be rejected"
        );
    }
    assert!(db.list_feed_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_icon_failure_does_not_fail_add() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss", rss(&[])).await;
    Mock::given(method("GET"))
        .and(path("/favicons"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (db, engine) = test_engine(&server).await;

    let feed = engine
        .add_feed(&format!("{}/rss", server.uri()))
        .await
        .unwrap();

    assert!(db.get_icon(&feed.domain).await.unwrap().is_none());
    assert_eq!(engine.get_icon(&feed.domain).await, GENERIC_ICON);
}

// ============================================================================
// Sync Tests
// ============================================================================

#[tokio::test]
async fn test_sync_all_isolates_failures() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/good",
        rss(&[("https://example.com/a", "Mon, 01 Jan 2024 00:00:00 GMT")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(200).set_body_string("garbage"))
        .mount(&server)
        .await;
    let (db, engine) = test_engine(&server).await;

    let bad = engine
        .sync_feed_at(&FeedRef::Url(format!("{}/bad", server.uri())), false, T)
        .await
        .unwrap();
    assert!(matches!(bad, SyncOutcome::Failed { .. }));
    let good = engine
        .sync_feed_at(&FeedRef::Url(format!("{}/good", server.uri())), false, T)
        .await
        .unwrap();
    assert!(matches!(good, SyncOutcome::Updated { new_items: 1, .. }));

    // Nothing due a second later
    let report = engine.sync_all_feeds_at(false, T + 1_000).await.unwrap();
    assert_eq!(report.skipped, 2);

    let report = engine.sync_all_feeds_at(true, T + 2_000).await.unwrap();
    assert_eq!((report.failed, report.unchanged, report.errors), (1, 1, 0));
    assert_eq!(db.get_items(&ItemFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sync_all_reads_clock_per_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_feed(&server, "/fast", rss(&[])).await;
    let (db, engine) = test_engine(&server).await;

    let mut ids = Vec::new();
    for route in ["/slow", "/fast"] {
        let id = db
            .insert_feed(&NewFeed {
                url: format!("{}{route}", server.uri()),
                title: String::new(),
                domain: "127.0.0.1".into(),
                poll_interval: 60_000,
            })
            .await
            .unwrap();
        ids.push(id);
    }

    let report = engine.sync_all_feeds(true).await.unwrap();
    assert_eq!(report.unchanged, 2);

    let slow = db.get_feed_by_id(ids[0]).await.unwrap().unwrap();
    let fast = db.get_feed_by_id(ids[1]).await.unwrap().unwrap();
    assert!(
        fast.last_check >= slow.last_check + 250,
        "second feed checked at {} but first at {}",
        fast.last_check,
        slow.last_check
    );
}

#[tokio::test]
async fn test_quiet_feed_interval_never_decreases() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss", rss(&[])).await;
    let (db, engine) = test_engine(&server).await;
    let url = format!("{}/rss", server.uri());
    let mut feed = engine.add_feed_at(&url, T).await.unwrap();
    feed.poll_interval = 60_000;
    db.update_feed(&feed).await.unwrap();

    let mut now = T;
    let mut previous = feed.poll_interval;
    for _ in 0..12 {
        now += previous;
        engine
            .sync_feed_at(&FeedRef::Id(feed.id), false, now)
            .await
            .unwrap();
        let current = db.get_feed_by_id(feed.id).await.unwrap().unwrap().poll_interval;
        assert!(current >= previous);
        assert!(current <= 600_000);
        previous = current;
    }
    assert_eq!(previous, 600_000);
}

// ============================================================================
// Listing and Delete Tests
// ============================================================================

#[tokio::test]
async fn test_get_feeds_counts_items() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/rss",
        rss(&[
            ("https://example.com/1", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("https://example.com/2", "Mon, 01 Jan 2024 00:00:00 GMT"),
        ]),
    )
    .await;
    let (_db, engine) = test_engine(&server).await;
    let feed = engine
        .add_feed(&format!("{}/rss", server.uri()))
        .await
        .unwrap();

    let feeds = engine.get_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].feed.id, feed.id);
    assert_eq!(feeds[0].total, 2);

    let json = serde_json::to_value(&feeds[0]).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["title"], "Mock Feed");
}

#[tokio::test]
async fn test_delete_feed_removes_items() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/rss",
        rss(&[("https://example.com/1", "Mon, 01 Jan 2024 00:00:00 GMT")]),
    )
    .await;
    let (db, engine) = test_engine(&server).await;
    let url = format!("{}/rss", server.uri());
    let feed = engine.add_feed(&url).await.unwrap();

    assert!(engine.delete_feed(&FeedRef::Url(url.clone())).await.unwrap());
    assert!(db.get_feed_by_id(feed.id).await.unwrap().is_none());
    assert!(engine
        .get_items(&ItemFilter::default())
        .await
        .unwrap()
        .is_empty());

    // Second delete is a no-op
    assert!(!engine.delete_feed(&FeedRef::Id(feed.id)).await.unwrap());
}
