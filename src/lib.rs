//! Newsletter signup service for a writer's website.
//!
//! `POST /api/subscribe` stores (upserts) a subscriber in Postgres and hands
//! it to the external mailing list, either inline or through admin-driven
//! CSV export batches. See `startup::run` for the full route table.

pub mod authentication;
pub mod cms_client;
pub mod configuration;
pub mod domain;
pub mod export;
pub mod list_client;
pub mod rate_limit;
pub mod routes;
pub mod startup;
pub mod subscriber_store;
pub mod telemetry;
pub mod utils;
