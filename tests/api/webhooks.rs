use serde_json::json;

use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;

#[tokio::test]
async fn webhook_is_acknowledged_with_the_right_secret() {
    let app = spawn_app().await;

    let resp = app
        .post_webhook(
            Some(&app.webhook_secret),
            &json!({ "type": "INSERT", "record": { "email": "foo@bar.com" } }),
        )
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["queued"], false);
    assert_eq!(body["hasPayload"], true);
}

#[tokio::test]
async fn webhook_without_payload() {
    let app = spawn_app().await;

    let resp = app.post_webhook(Some(&app.webhook_secret), &json!(null)).await;

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["hasPayload"], false);
}

#[tokio::test]
async fn webhook_rejects_missing_or_wrong_secret() {
    let app = spawn_app().await;

    for secret in [None, Some("wrong")] {
        let resp = app.post_webhook(secret, &json!({})).await;
        assert_eq!(resp.status().as_u16(), 401, "{secret:?}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn webhook_is_locked_without_a_configured_secret() {
    let app = spawn_app_with(|c| c.newsletter.webhook_secret = None).await;

    let resp = app.post_webhook(Some(&app.webhook_secret), &json!({})).await;

    assert_eq!(resp.status().as_u16(), 401);
}
