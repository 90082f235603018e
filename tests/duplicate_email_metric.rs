//! Error counter behaviour, in its own binary because the metrics recorder
//! is process-global.

use axum::http::{Method, StatusCode};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

mod common;

fn duplicate_email_count(snapshotter: &Snapshotter) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| key.key().name() == "serversage_errors_total")
        .filter(|(key, _, _, _)| {
            let labels: Vec<_> = key.key().labels().map(|l| (l.key(), l.value())).collect();
            labels.contains(&("component", "user-service"))
                && labels.contains(&("exception_type", "DuplicateEmailException"))
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .sum()
}

#[tokio::test]
async fn test_batch_with_existing_email_counts_one_duplicate() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().unwrap();

    let app = common::spawn_app().await;
    let before = duplicate_email_count(&snapshotter);

    let reply = app
        .request(
            Method::POST,
            "/api/users/batch",
            Some(json!([
                { "name": "Grace", "email": "grace@example.com" },
                { "name": "Alice Again", "email": "alice@example.com" }
            ])),
        )
        .await;

    assert_eq!(reply.status, StatusCode::CONFLICT);
    let body = reply.json();
    assert_eq!(body["error"], "DUPLICATE_EMAIL");
    assert_eq!(body["message"], "One or more users have duplicate email addresses");

    assert_eq!(duplicate_email_count(&snapshotter) - before, 1);

    // The batch ran in one transaction, so the valid user was rolled back too.
    let missing = app.get("/api/users/email/grace@example.com").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
