mod admin_mark_synced;
mod health_check;
mod helpers;
mod webhooks;
