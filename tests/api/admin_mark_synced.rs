use serde_json::json;
use uuid::Uuid;

use crate::helpers::spawn_app;
use crate::helpers::Export;
use crate::helpers::TestApp;

async fn export_batch(app: &TestApp) -> Uuid {
    match app.export().await {
        Export::Csv { batch_id, .. } => batch_id,
        Export::NothingPending => panic!("expected a csv export"),
    }
}

#[tokio::test]
async fn export_then_mark_synced_round_trip() {
    let app = spawn_app().await;
    app.seed_subscribers(3).await;
    let batch_id = export_batch(&app).await;

    let resp = app
        .post_mark_synced(Some(&app.admin_token), &json!({ "batchId": batch_id }))
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["markedCount"], 3);
    assert_eq!(body["batchId"], batch_id.to_string());

    for row in app.subscribers().await {
        assert!(row.substack_synced, "{}", row.email);
        // kept as provenance
        assert_eq!(row.sync_batch_id, Some(batch_id));
    }

    // idempotent
    let resp = app
        .post_mark_synced(Some(&app.admin_token), &json!({ "batchId": batch_id }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["markedCount"], 0);
}

#[tokio::test]
async fn only_the_named_batch_is_marked() {
    let app = spawn_app().await;
    app.seed_subscribers(2).await;
    let first = export_batch(&app).await;
    app.post_subscribe_from("8.8.8.8", &json!({ "email": "later@example.com", "source": "popup" }))
        .await;
    let second = export_batch(&app).await;

    let resp = app
        .post_mark_synced(Some(&app.admin_token), &json!({ "batchId": second }))
        .await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["markedCount"], 1);

    for row in app.subscribers().await {
        assert_eq!(row.substack_synced, row.sync_batch_id == Some(second), "{}", row.email);
        if !row.substack_synced {
            assert_eq!(row.sync_batch_id, Some(first));
        }
    }
}

#[tokio::test]
async fn unknown_batch_marks_nothing() {
    let app = spawn_app().await;

    let resp = app
        .post_mark_synced(Some(&app.admin_token), &json!({ "batchId": Uuid::new_v4() }))
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["markedCount"], 0);
}

#[tokio::test]
async fn invalid_batch_id_is_rejected() {
    let app = spawn_app().await;

    for (body, msg) in [
        (json!({ "batchId": "batch-1" }), "not a uuid"),
        (json!({ "batchId": 42 }), "not a string"),
        (json!({}), "missing"),
        (json!(null), "null body"),
    ] {
        let resp = app.post_mark_synced(Some(&app.admin_token), &body).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false, "{msg}");
        assert!(body["error"].as_str().unwrap().contains("batchId"), "{msg}");
    }
}

#[tokio::test]
async fn mark_synced_requires_the_admin_token() {
    let app = spawn_app().await;
    app.seed_subscribers(2).await;
    let batch_id = export_batch(&app).await;

    for token in [None, Some("wrong")] {
        let resp = app
            .post_mark_synced(token, &json!({ "batchId": batch_id }))
            .await;
        assert_eq!(resp.status().as_u16(), 401, "{token:?}");
    }

    assert!(app.subscribers().await.iter().all(|r| !r.substack_synced));
}
