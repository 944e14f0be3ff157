use actix_web::http::header::CONTENT_DISPOSITION;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::web;
use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::AdminError;
use crate::domain::SyncBatchId;
use crate::export::build_csv;
use crate::export::export_filename;
use crate::startup::ExportLimit;
use crate::subscriber_store::assign_batch;
use crate::subscriber_store::select_pending_export;

pub const BATCH_ID_HEADER: &str = "X-Substack-Sync-Batch-Id";

fn nothing_pending() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "No pending subscribers to export",
    }))
}

/// `GET /api/admin/export-pending`
///
/// Claims every unsynced, unbatched subscriber (up to the export limit) for a
/// fresh batch, and returns them as a CSV attachment. The batch id is in both
/// the filename and the `X-Substack-Sync-Batch-Id` header; pass it to
/// `POST /api/admin/mark-synced` once the import on the provider side is done.
///
/// Only the rows this call actually claimed are exported. When two exports
/// race, each row ends up in exactly one of the two files.
#[tracing::instrument(
    name = "Exporting pending subscribers",
    skip(pool, limit),
    fields(batch_id = tracing::field::Empty, exported = tracing::field::Empty)
)]
pub async fn export_pending(
    pool: web::Data<PgPool>,
    limit: web::Data<ExportLimit>,
) -> Result<HttpResponse, AdminError> {
    let pending = select_pending_export(limit.0, &pool)
        .await
        .map_err(|e| AdminError::StoreError("Failed to fetch pending subscribers", e))?;
    if pending.is_empty() {
        return Ok(nothing_pending());
    }

    let batch_id = SyncBatchId::generate();
    let ids: Vec<Uuid> = pending.iter().map(|row| row.id).collect();
    let claimed = assign_batch(&ids, batch_id, Utc::now(), &pool)
        .await
        .map_err(|e| AdminError::StoreError("Failed to assign export batch", e))?;

    tracing::Span::current()
        .record("batch_id", tracing::field::display(&batch_id))
        .record("exported", claimed.len());

    if claimed.is_empty() {
        // everything was claimed by a concurrent export in the meantime
        return Ok(nothing_pending());
    }
    if claimed.len() < pending.len() {
        tracing::info!(
            selected = pending.len(),
            claimed = claimed.len(),
            "some rows were claimed by a concurrent export"
        );
    }

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/csv; charset=utf-8"))
        .insert_header((
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export_filename(&batch_id)),
        ))
        .insert_header((BATCH_ID_HEADER, batch_id.to_string()))
        .body(build_csv(&claimed)))
}
