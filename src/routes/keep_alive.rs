use actix_web::web;
use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;

use crate::cms_client::CmsClient;
use crate::cms_client::PingStatus;

/// `GET /api/keep-alive`
///
/// Meant to be hit by an external cron every few minutes: pings the CMS
/// health endpoint so its host does not idle it out. `ok` and `degraded`
/// answer 200, an unreachable CMS answers 503.
pub async fn keep_alive(cms: web::Data<CmsClient>) -> HttpResponse {
    let report = cms.ping().await;
    let body = json!({
        "status": report.status,
        "cms": report,
        "timestamp": Utc::now(),
    });
    match report.status {
        PingStatus::Error => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::Ok().json(body),
    }
}
