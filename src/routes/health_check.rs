use actix_web::HttpResponse;

/// `GET /health_check`
///
/// Liveness probe for the host; touches neither the db nor the list provider.
pub async fn health_check() -> HttpResponse { HttpResponse::Ok().finish() }
