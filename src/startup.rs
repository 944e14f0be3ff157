use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::web::Data;
use actix_web::App;
use actix_web::HttpServer;
use actix_web_lab::middleware::from_fn;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;

use crate::authentication::reject_unauthorized_admins;
use crate::authentication::AdminToken;
use crate::authentication::WebhookSecret;
use crate::cms_client::CmsClient;
use crate::configuration::DatabaseSettings;
use crate::configuration::Settings;
use crate::configuration::SyncMode;
use crate::list_client::ListClient;
use crate::rate_limit::RateLimiter;
use crate::routes::export_pending;
use crate::routes::health_check;
use crate::routes::keep_alive;
use crate::routes::mark_synced;
use crate::routes::subscribe;
use crate::routes::subscriber_added;

/// Wrapper for actix's `Server` with access to the bound port.
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Bind the listener, build the shared clients and start serving.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;
        // port 0 -> whatever the OS picked
        let port = listener.local_addr()?.port();

        let pool = get_connection_pool(&cfg.database);
        let rate_limiter = RateLimiter::new(
            cfg.newsletter.rate_limit_per_hour,
            cfg.newsletter.rate_limit_window(),
        );

        let state = AppState {
            pool,
            rate_limiter,
            list_client: cfg.list_provider.client()?,
            cms_client: cfg.cms.client()?,
            admin_token: AdminToken(cfg.newsletter.admin_token.clone()),
            webhook_secret: WebhookSecret(cfg.newsletter.webhook_secret.clone()),
            sync_policy: SyncPolicy {
                sync_mode: cfg.newsletter.sync_mode,
                fallback_url: cfg.list_provider.signup_url.clone(),
            },
            export_limit: ExportLimit(cfg.newsletter.export_limit),
        };

        tracing::info!(
            port,
            sync_mode = ?cfg.newsletter.sync_mode,
            rate_limit_per_hour = cfg.newsletter.rate_limit_per_hour,
            admin_enabled = cfg.newsletter.admin_token.is_some(),
            "starting newsletter api"
        );

        let server = run(listener, state)?;
        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// `connect_lazy_with` only connects on first use, so `/health_check` works
/// even while the db is down.
pub fn get_connection_pool(db_cfg: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect_lazy_with(db_cfg.connection())
}

/// How `subscribe` hands new subscribers to the mailing list.
pub struct SyncPolicy {
    pub sync_mode: SyncMode,
    /// Provider signup page, returned when inline sync fails
    pub fallback_url: String,
}

/// Maximum rows per export batch
pub struct ExportLimit(pub i64);

/// Everything the handlers extract with `web::Data`. Each field has a
/// distinct type, since `Data` is looked up by type.
pub struct AppState {
    pub pool: PgPool,
    pub rate_limiter: RateLimiter,
    pub list_client: ListClient,
    pub cms_client: CmsClient,
    pub admin_token: AdminToken,
    pub webhook_secret: WebhookSecret,
    pub sync_policy: SyncPolicy,
    pub export_limit: ExportLimit,
}

/// Declares all API endpoints. The server only listens on an already bound
/// listener.
pub fn run(
    listener: TcpListener,
    state: AppState,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc`: one instance shared by every worker. The rate
    // limiter in particular must not be rebuilt per worker.
    let pool = Data::new(state.pool);
    let rate_limiter = Data::new(state.rate_limiter);
    let list_client = Data::new(state.list_client);
    let cms_client = Data::new(state.cms_client);
    let admin_token = Data::new(state.admin_token);
    let webhook_secret = Data::new(state.webhook_secret);
    let sync_policy = Data::new(state.sync_policy);
    let export_limit = Data::new(state.export_limit);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    .route("/subscribe", web::post().to(subscribe))
                    .route("/keep-alive", web::get().to(keep_alive))
                    .route("/webhooks/subscriber-added", web::post().to(subscriber_added))
                    .service(
                        web::scope("/admin")
                            .wrap(from_fn(reject_unauthorized_admins))
                            .route("/export-pending", web::get().to(export_pending))
                            .route("/mark-synced", web::post().to(mark_synced)),
                    ),
            )
            .app_data(pool.clone())
            .app_data(rate_limiter.clone())
            .app_data(list_client.clone())
            .app_data(cms_client.clone())
            .app_data(admin_token.clone())
            .app_data(webhook_secret.clone())
            .app_data(sync_policy.clone())
            .app_data(export_limit.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
