//! Every query against `newsletter_subscribers`. Only db logic lives here; it
//! is independent of the web framework.
//!
//! Queries are checked at runtime (`sqlx::query`, not `sqlx::query!`) so the
//! crate builds without a live database or an offline `.sqlx` cache.

use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::NewSubscriber;
use crate::domain::SubscriberEmail;
use crate::domain::SyncBatchId;

/// Any datastore failure. Callers do not distinguish transient from permanent
/// failures; the underlying `sqlx::Error` is kept as the source for logging.
#[derive(thiserror::Error, Debug)]
#[error("Subscriber store operation failed")]
pub struct StoreError(#[from] sqlx::Error);

/// A row waiting to be exported to the mailing list.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct PendingSubscriber {
    pub id: Uuid,
    pub email: String,
    pub source: String,
    pub subscribed_at: DateTime<Utc>,
}

/// Sync columns of a row as they stand after an upsert.
#[derive(sqlx::FromRow, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub substack_synced: bool,
    pub sync_batch_id: Option<Uuid>,
}

impl SyncState {
    /// In an export batch, waiting for `mark-synced`
    pub fn is_batched(&self) -> bool { !self.substack_synced && self.sync_batch_id.is_some() }
}

fn log_query_error(e: sqlx::Error) -> StoreError {
    tracing::error!("bad query: {e:?}");
    StoreError(e)
}

/// Insert, or refresh `source`/`status`/`subscribed_at` of an existing row
/// with the same email. `substack_synced` and `sync_batch_id` are never
/// touched, so re-subscribing cannot undo a sync; their current values are
/// returned.
#[tracing::instrument(
    name = "Upserting subscriber",
    skip(new_sub, pool),
    fields(subscriber_email = %new_sub.email, source = %new_sub.source)
)]
pub async fn upsert_subscriber(
    new_sub: &NewSubscriber,
    pool: &PgPool,
) -> Result<SyncState, StoreError> {
    let state = sqlx::query_as::<_, SyncState>(
        r#"
        INSERT INTO newsletter_subscribers (id, email, source, status, subscribed_at)
        VALUES ($1, $2, $3, 'active', $4)
        ON CONFLICT (email) DO UPDATE
        SET
            source = EXCLUDED.source,
            status = EXCLUDED.status,
            subscribed_at = EXCLUDED.subscribed_at
        RETURNING substack_synced, sync_batch_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_sub.email.as_ref())
    .bind(new_sub.source.as_str())
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(log_query_error)?;
    Ok(state)
}

/// Stamp `substack_sync_queued_at`, unless the row is already synced or
/// already in a batch. Returns whether a row was stamped.
#[tracing::instrument(name = "Marking subscriber as queued for sync", skip(pool))]
pub async fn mark_queued_for_sync(
    email: &SubscriberEmail,
    queued_at: DateTime<Utc>,
    pool: &PgPool,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE newsletter_subscribers
        SET substack_sync_queued_at = $2
        WHERE
            email = $1 AND
            substack_synced = false AND
            sync_batch_id IS NULL
        "#,
    )
    .bind(email.as_ref())
    .bind(queued_at)
    .execute(pool)
    .await
    .map_err(log_query_error)?;
    Ok(result.rows_affected() > 0)
}

/// Flip `substack_synced` after a successful inline sync. The batch id, if
/// any, is left alone.
#[tracing::instrument(name = "Marking subscriber as synced", skip(pool))]
pub async fn mark_subscriber_synced(
    email: &SubscriberEmail,
    pool: &PgPool,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE newsletter_subscribers
        SET substack_synced = true
        WHERE email = $1 AND substack_synced = false
        "#,
    )
    .bind(email.as_ref())
    .execute(pool)
    .await
    .map_err(log_query_error)?;
    Ok(result.rows_affected() > 0)
}

/// Unsynced rows not yet in any batch, oldest first, at most `limit` of them.
#[tracing::instrument(name = "Selecting subscribers pending export", skip(pool))]
pub async fn select_pending_export(
    limit: i64,
    pool: &PgPool,
) -> Result<Vec<PendingSubscriber>, StoreError> {
    let rows = sqlx::query_as::<_, PendingSubscriber>(
        r#"
        SELECT id, email, source, subscribed_at
        FROM newsletter_subscribers
        WHERE substack_synced = false AND sync_batch_id IS NULL
        ORDER BY subscribed_at ASC, id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(log_query_error)?;
    Ok(rows)
}

/// Claim `ids` for `batch_id`. This is a single conditional `UPDATE`: a row
/// already claimed by a concurrent export (or synced in the meantime) fails
/// the `WHERE` re-check and is skipped, so no row ever lands in two batches.
///
/// Returns the rows this call actually claimed, oldest first; this may be
/// fewer than `ids`.
#[tracing::instrument(
    name = "Assigning sync batch",
    skip(ids, pool),
    fields(batch_id = %batch_id, requested = ids.len())
)]
pub async fn assign_batch(
    ids: &[Uuid],
    batch_id: SyncBatchId,
    queued_at: DateTime<Utc>,
    pool: &PgPool,
) -> Result<Vec<PendingSubscriber>, StoreError> {
    let mut claimed = sqlx::query_as::<_, PendingSubscriber>(
        r#"
        UPDATE newsletter_subscribers
        SET
            sync_batch_id = $1,
            substack_sync_queued_at = $2
        WHERE
            id = ANY($3) AND
            substack_synced = false AND
            sync_batch_id IS NULL
        RETURNING id, email, source, subscribed_at
        "#,
    )
    .bind(batch_id.as_ref())
    .bind(queued_at)
    .bind(ids)
    .fetch_all(pool)
    .await
    .map_err(log_query_error)?;

    // RETURNING gives no ordering guarantee
    claimed.sort_by(|a, b| {
        a.subscribed_at
            .cmp(&b.subscribed_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(claimed)
}

/// Confirm a batch as delivered: every row of `batch_id` still unsynced
/// becomes synced. `sync_batch_id` is kept on the rows as provenance.
///
/// Returns the number of rows flipped; repeating the call returns 0.
#[tracing::instrument(name = "Marking batch as synced", skip(pool), fields(batch_id = %batch_id))]
pub async fn mark_batch_synced(
    batch_id: SyncBatchId,
    pool: &PgPool,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE newsletter_subscribers
        SET substack_synced = true
        WHERE sync_batch_id = $1 AND substack_synced = false
        "#,
    )
    .bind(batch_id.as_ref())
    .execute(pool)
    .await
    .map_err(log_query_error)?;
    Ok(result.rows_affected())
}
