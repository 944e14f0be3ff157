use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

/// `{"success": false, "error": message}` with the given status. Every
/// failure response of the API has this shape; details stay in the logs.
pub fn json_error(
    status: StatusCode,
    message: &str,
) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "success": false,
        "error": message,
    }))
}
