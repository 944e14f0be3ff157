use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use super::error_chain_fmt;
use crate::configuration::SyncMode;
use crate::domain::NewSubscriber;
use crate::domain::SubscribeBody;
use crate::list_client::ListClient;
use crate::rate_limit::client_key;
use crate::rate_limit::RateLimiter;
use crate::startup::SyncPolicy;
use crate::subscriber_store::mark_queued_for_sync;
use crate::subscriber_store::mark_subscriber_synced;
use crate::subscriber_store::upsert_subscriber;
use crate::subscriber_store::StoreError;

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Too many subscription attempts. Please try again later.")]
    RateLimited,
    #[error("Unable to save your subscription right now.")]
    StoreError(#[source] StoreError),
}

impl Debug for SubscribeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // `Display` never carries the store error, only the generic message
    fn error_response(&self) -> HttpResponse { crate::utils::json_error(self.status_code(), &self.to_string()) }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: &'static str,
    pub substack_synced: bool,
    pub sync_queued: bool,
    /// Only set when inline sync failed: the visitor can finish signing up
    /// on the provider's own page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
}

/// `POST /api/subscribe`, JSON body `{"email": ..., "source": ...}`.
///
/// validate -> rate limit -> upsert -> sync (inline) or queue (batch).
///
/// Once the upsert succeeds the response is always `success: true`; a failed
/// or skipped sync only shows up in `substackSynced`/`syncQueued`, which
/// reflect the stored row. A subscriber that is already synced is not sent
/// to the list provider again.
///
/// # Request example
///
/// ```sh
///     curl -H 'Content-Type: application/json' \
///         --data '{"email":"john@foo.com","source":"footer"}' \
///         http://127.0.0.1:8000/api/subscribe
/// ```
#[tracing::instrument(
    name = "Adding new subscriber",
    skip(req, body, pool, rate_limiter, list_client, policy),
    fields(
        subscriber_email = tracing::field::Empty,
        source = tracing::field::Empty,
        client_key = tracing::field::Empty,
    )
)]
pub async fn subscribe(
    req: HttpRequest,
    body: web::Bytes,
    pool: web::Data<PgPool>,
    rate_limiter: web::Data<RateLimiter>,
    list_client: web::Data<ListClient>,
    policy: web::Data<SyncPolicy>,
) -> Result<HttpResponse, SubscribeError> {
    // parsed by hand (rather than `web::Json`) so that malformed bodies get
    // the same JSON error shape as invalid fields
    let body: SubscribeBody = serde_json::from_slice(&body)
        .map_err(|_| SubscribeError::ValidationError("Invalid request body".to_string()))?;
    let new_sub: NewSubscriber = body.try_into().map_err(SubscribeError::ValidationError)?;

    let key = client_key(&req);
    tracing::Span::current()
        .record("subscriber_email", tracing::field::display(&new_sub.email))
        .record("source", tracing::field::display(&new_sub.source))
        .record("client_key", tracing::field::display(&key));

    if rate_limiter.check(&key) {
        tracing::warn!("subscribe attempts exceeded {} per window", rate_limiter.limit());
        return Err(SubscribeError::RateLimited);
    }

    let state = upsert_subscriber(&new_sub, &pool)
        .await
        .map_err(SubscribeError::StoreError)?;

    if state.substack_synced {
        // terminal: nothing to queue and nothing to send again
        return Ok(HttpResponse::Ok().json(SubscribeResponse {
            success: true,
            message: "You're already subscribed!",
            substack_synced: true,
            sync_queued: false,
            fallback_url: None,
        }));
    }

    let resp = match policy.sync_mode {
        SyncMode::Batch if state.is_batched() => SubscribeResponse {
            success: true,
            message: "You're subscribed!",
            substack_synced: false,
            sync_queued: true,
            fallback_url: None,
        },
        SyncMode::Batch => {
            // `false` when an export claimed the row after the upsert
            let sync_queued = match mark_queued_for_sync(&new_sub.email, Utc::now(), &pool).await {
                Ok(stamped) => stamped,
                Err(e) => {
                    tracing::error!(error.cause_chain = ?e, "failed to stamp sync queue timestamp");
                    false
                }
            };
            SubscribeResponse {
                success: true,
                message: "You're subscribed!",
                substack_synced: false,
                sync_queued,
                fallback_url: None,
            }
        }
        SyncMode::Inline => {
            let outcome = list_client.sync_subscriber(&new_sub.email).await;
            match outcome.synced {
                true => {
                    if let Err(e) = mark_subscriber_synced(&new_sub.email, &pool).await {
                        // the provider has the address; a later export may send it again
                        tracing::error!(error.cause_chain = ?e, "failed to record inline sync");
                    }
                    SubscribeResponse {
                        success: true,
                        message: "You're in. Please check your inbox for a confirmation email.",
                        substack_synced: true,
                        sync_queued: false,
                        fallback_url: None,
                    }
                }
                false => {
                    tracing::warn!(?outcome, "inline sync failed, subscriber kept locally");
                    SubscribeResponse {
                        success: true,
                        message: "Saved successfully, but automatic sync was blocked. Please complete your subscription on the newsletter page.",
                        substack_synced: false,
                        sync_queued: false,
                        fallback_url: Some(policy.fallback_url.clone()),
                    }
                }
            }
        }
    };

    Ok(HttpResponse::Ok().json(resp))
}
