use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use serde_json::json;

use crate::authentication::WebhookSecret;
use crate::utils::json_error;

/// `POST /api/webhooks/subscriber-added`
///
/// Called by the datastore when a subscriber row is inserted. Nothing is
/// queued yet: export happens through `/api/admin/export-pending` until a
/// job queue is attached, so this only authenticates and acknowledges.
#[tracing::instrument(name = "Receiving subscriber-added webhook", skip_all)]
pub async fn subscriber_added(
    req: HttpRequest,
    body: web::Bytes,
    secret: web::Data<WebhookSecret>,
) -> HttpResponse {
    if let Err(e) = secret.validate(req.headers()) {
        tracing::warn!(error.message = %e, "rejected webhook");
        return json_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let has_payload = serde_json::from_slice::<serde_json::Value>(&body)
        .map(|v| !v.is_null())
        .unwrap_or(false);
    tracing::info!(has_payload, "webhook acknowledged");

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Webhook received",
        "queued": false,
        "note": "No job queue attached; export pending subscribers via /api/admin/export-pending.",
        "hasPayload": has_payload,
    }))
}
