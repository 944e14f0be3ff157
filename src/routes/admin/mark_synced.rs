use actix_web::web;
use actix_web::HttpResponse;
use serde::Deserialize;
use serde::Serialize;
use sqlx::PgPool;

use super::AdminError;
use crate::domain::SyncBatchId;
use crate::subscriber_store::mark_batch_synced;

#[derive(Deserialize)]
struct MarkSyncedBody {
    #[serde(rename = "batchId", default)]
    batch_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkSyncedResponse {
    success: bool,
    marked_count: u64,
    batch_id: String,
}

/// `POST /api/admin/mark-synced`, JSON body `{"batchId": "<uuid>"}`.
///
/// Idempotent: a batch that was already confirmed reports `markedCount: 0`.
#[tracing::instrument(name = "Marking export batch as synced", skip(body, pool))]
pub async fn mark_synced(
    body: web::Bytes,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AdminError> {
    let batch_id = serde_json::from_slice::<MarkSyncedBody>(&body)
        .ok()
        .and_then(|b| b.batch_id)
        .ok_or_else(|| "batchId must be a valid UUID".to_string())
        .and_then(|id| SyncBatchId::parse(&id))
        .map_err(AdminError::ValidationError)?;

    let marked_count = mark_batch_synced(batch_id, &pool)
        .await
        .map_err(|e| AdminError::StoreError("Failed to mark batch as synced", e))?;
    tracing::info!(%batch_id, marked_count, "batch confirmed");

    Ok(HttpResponse::Ok().json(MarkSyncedResponse {
        success: true,
        marked_count,
        batch_id: batch_id.to_string(),
    }))
}
