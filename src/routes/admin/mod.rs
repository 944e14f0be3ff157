mod export_pending;
mod mark_synced;

use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use actix_web::ResponseError;
pub use export_pending::*;
pub use mark_synced::*;

use super::error_chain_fmt;
use crate::subscriber_store::StoreError;

/// Failures of the `/admin` handlers. Authorization is checked before these
/// run, by `reject_unauthorized_admins`.
#[derive(thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    ValidationError(String),
    /// The message is what the caller sees; the store error is only logged.
    #[error("{0}")]
    StoreError(&'static str, #[source] StoreError),
}

impl Debug for AdminError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for AdminError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::StoreError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse { crate::utils::json_error(self.status_code(), &self.to_string()) }
}
