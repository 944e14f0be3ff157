use actix_web::body::MessageBody;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::web;
use actix_web_lab::middleware::Next;

use super::AdminToken;
use crate::utils::json_error;

/// Guards the whole `/admin` scope: the handler (and therefore the datastore)
/// is never reached without a valid bearer token.
///
/// For more details, refer to the documentation for
/// `actix_web_lab::middleware::from_fn`
pub async fn reject_unauthorized_admins(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let outcome = match req.app_data::<web::Data<AdminToken>>() {
        Some(token) => token.validate(req.headers()),
        None => Err(super::AuthError::NotConfigured),
    };

    match outcome {
        Ok(()) => next.call(req).await,
        Err(e) => {
            tracing::warn!(error.message = %e, path = %req.path(), "rejected admin request");
            let resp = json_error(StatusCode::UNAUTHORIZED, "Unauthorized");
            Err(InternalError::from_response(anyhow::anyhow!(e), resp).into())
        }
    }
}
