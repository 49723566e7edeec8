//! Hook behaviour over a scripted transport.

use route_query::config::QueryDefaults;
use route_query::framework::mock::MockTransport;
use route_query::hooks::{MutationOptions, PayloadSource, QueryOptions, Status};
use route_query::lifecycle::ApiSystem;
use route_query::model::PostId;
use route_query::routes::{GetPostById, GetPosts};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

fn post_json(id: u64) -> serde_json::Value {
    json!({"userId": 1, "id": id, "title": format!("post {id}"), "body": "lorem"})
}

fn system_for(mock: &MockTransport) -> ApiSystem {
    let defaults = QueryDefaults {
        retry_delay: Duration::from_millis(1),
        ..QueryDefaults::default()
    };
    ApiSystem::with_transport(mock.transport(), defaults)
}

/// Changing a reactive payload fetches the new key and drops the old data meanwhile.
#[tokio::test]
async fn test_reactive_payload_refetches_new_key() {
    let mock = MockTransport::new();
    mock.expect_get("posts/1").return_ok(post_json(1));
    mock.expect_get("posts/2")
        .after(Duration::from_millis(50))
        .return_ok(post_json(2));
    let system = system_for(&mock);

    let (id_tx, id_rx) = watch::channel(PostId::from(1u64));
    let query = system
        .hooks
        .use_query::<GetPostById>(id_rx, QueryOptions::default());
    let first = query.wait_settled().await;
    assert_eq!(first.data.map(|e| e.data.id), Some(1));

    let mut states = query.subscribe();
    id_tx.send(PostId::from(2u64)).expect("Query hook gone");

    let mut saw_cleared = false;
    loop {
        states.changed().await.expect("Query hook gone");
        let state = states.borrow_and_update().clone();
        if state.status == Status::Pending && state.data.is_none() {
            saw_cleared = true;
        }
        if let Some(envelope) = &state.data {
            if envelope.data.id == 2 {
                break;
            }
        }
    }
    assert!(saw_cleared, "data for post 1 must not be shown as post 2");
    assert_eq!(mock.requests_seen(), vec!["posts/1".to_string(), "posts/2".to_string()]);

    drop(query);
    system.shutdown().await.expect("Shutdown failed");
    mock.verify();
}

/// Switching the payload shows the new key without waiting for the old key's fetch.
#[tokio::test]
async fn test_payload_switch_does_not_wait_for_previous_fetch() {
    let mock = MockTransport::new();
    mock.expect_get("posts/1")
        .after(Duration::from_millis(300))
        .return_ok(post_json(1));
    mock.expect_get("posts/2").return_ok(post_json(2));
    let system = system_for(&mock);

    let (id_tx, id_rx) = watch::channel(PostId::from(1u64));
    let query = system
        .hooks
        .use_query::<GetPostById>(id_rx, QueryOptions::default());
    tokio::time::sleep(Duration::from_millis(20)).await;

    id_tx.send(PostId::from(2u64)).expect("Query hook gone");
    let switched_at = Instant::now();
    let state = query
        .wait_until(|s| s.data.as_ref().is_some_and(|e| e.data.id == 2))
        .await;
    assert!(state.is_success());
    assert!(
        switched_at.elapsed() < Duration::from_millis(200),
        "new key waited {:?}",
        switched_at.elapsed()
    );

    // The old key's late result must not overwrite the new key's data.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(query.data().map(|e| e.data.id), Some(2));
    assert!(query.state().is_settled());

    drop(query);
    system.shutdown().await.expect("Shutdown failed");
    mock.verify();
}

/// A disabled query sends nothing until refetched.
#[tokio::test]
async fn test_disabled_query_waits_for_refetch() {
    let mock = MockTransport::new();
    mock.expect_get("posts").return_ok(json!([post_json(1)]));
    let system = system_for(&mock);

    let query = system
        .hooks
        .use_query::<GetPosts>((), QueryOptions::default().disabled());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(query.state().status, Status::Idle);
    assert!(mock.requests_seen().is_empty());

    let state = query.refetch().await.expect("Refetch failed");
    assert!(state.is_success());
    assert_eq!(state.data.map(|e| e.data.len()), Some(1));

    drop(query);
    system.shutdown().await.expect("Shutdown failed");
    mock.verify();
}

/// A failed refetch reports the error and keeps the last good data.
#[tokio::test]
async fn test_failed_refetch_keeps_previous_data() {
    let mock = MockTransport::new();
    mock.expect_get("posts/3").return_ok(post_json(3));
    mock.expect_get("posts/3").return_status(500);
    let system = system_for(&mock);

    let query = system.hooks.use_query::<GetPostById>(
        PayloadSource::fixed(PostId::from(3u64)),
        QueryOptions::default().with_retry(0),
    );
    assert!(query.wait_settled().await.is_success());

    let state = query.refetch().await.expect("Refetch failed");
    assert_eq!(state.status, Status::Error);
    assert_eq!(state.data.map(|e| e.data.id), Some(3));
    let status = state.error.as_ref().and_then(|e| e.transport()).and_then(|e| e.status());
    assert_eq!(status, Some(500));

    drop(query);
    system.shutdown().await.expect("Shutdown failed");
    mock.verify();
}

/// Failed reads are retried per the default policy before the error shows.
#[tokio::test]
async fn test_query_retries_before_failing() {
    let mock = MockTransport::new();
    mock.expect_get("posts/8").return_status(503);
    mock.expect_get("posts/8").return_ok(post_json(8));
    let system = system_for(&mock);

    let query = system.hooks.use_query::<GetPostById>(
        PayloadSource::fixed(PostId::from(8u64)),
        QueryOptions::default(),
    );
    let state = query.wait_settled().await;

    assert!(state.is_success());
    assert_eq!(mock.requests_seen().len(), 2);

    drop(query);
    system.shutdown().await.expect("Shutdown failed");
}

/// A successful mutation invalidates the listed prefixes, so the next read refetches.
#[tokio::test]
async fn test_mutation_invalidates_cached_reads() {
    let mock = MockTransport::new();
    mock.expect_get("posts").return_ok(json!([post_json(1)]));
    mock.expect_get("posts/1").return_ok(post_json(1));
    mock.expect_get("posts").return_ok(json!([post_json(1), post_json(2)]));
    let system = system_for(&mock);

    let before = system.hooks.use_query::<GetPosts>((), QueryOptions::default());
    assert_eq!(before.wait_settled().await.data.map(|e| e.data.len()), Some(1));

    let mutation = system
        .hooks
        .use_mutation::<GetPostById>(MutationOptions::default().invalidates("posts-"));
    mutation.mutate(PostId::from(1u64)).await.expect("Mutation failed");
    assert_eq!(mutation.state().variables, Some(PostId::from(1u64)));

    let after = system.hooks.use_query::<GetPosts>((), QueryOptions::default());
    assert_eq!(after.wait_settled().await.data.map(|e| e.data.len()), Some(2));

    drop(before);
    drop(after);
    drop(mutation);
    system.shutdown().await.expect("Shutdown failed");
    mock.verify();
}
