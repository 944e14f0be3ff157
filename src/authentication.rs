// two kinds of machine clients call the protected endpoints:
//
// 1. an operator (or a cron worker) exporting and confirming sync batches,
//    authenticated with a static bearer token
// 2. the hosted datastore firing a webhook on insert, authenticated with a
//    shared secret header
//
// neither has a session, so there is no login flow; both secrets come from
// configuration and an unset secret locks the endpoint entirely

mod middleware;

use actix_web::http::header::HeaderMap;
use actix_web::http::header::AUTHORIZATION;
pub use middleware::reject_unauthorized_admins;
use secrecy::ExposeSecret;
use secrecy::Secret;

pub const WEBHOOK_SECRET_HEADER: &str = "x-newsletter-webhook-secret";

/// Bearer token guarding `/api/admin/*`
#[derive(Clone)]
pub struct AdminToken(pub Option<Secret<String>>);

/// Shared secret guarding `/api/webhooks/*`
#[derive(Clone)]
pub struct WebhookSecret(pub Option<Secret<String>>);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("No secret configured")]
    NotConfigured,
    #[error("Missing credentials")]
    MissingCredentials,
    #[error("Invalid credentials")]
    InvalidCredentials,
}

/// `Authorization: Bearer <token>` -> `<token>` (trimmed). Any other scheme
/// is treated as absent.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn compare(
    expected: &Option<Secret<String>>,
    supplied: Option<&str>,
) -> Result<(), AuthError> {
    let expected = expected
        .as_ref()
        .map(|s| s.expose_secret().as_str())
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::NotConfigured)?;
    match supplied {
        None => Err(AuthError::MissingCredentials),
        Some(s) if s == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidCredentials),
    }
}

impl AdminToken {
    pub fn validate(
        &self,
        headers: &HeaderMap,
    ) -> Result<(), AuthError> {
        compare(&self.0, bearer_token(headers))
    }
}

impl WebhookSecret {
    pub fn validate(
        &self,
        headers: &HeaderMap,
    ) -> Result<(), AuthError> {
        let supplied = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        compare(&self.0, supplied)
    }
}
