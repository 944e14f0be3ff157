use chrono::DateTime;
use chrono::Utc;
use newsletter_api::configuration::get_configuration;
use newsletter_api::configuration::DatabaseSettings;
use newsletter_api::configuration::Settings;
use newsletter_api::routes::BATCH_ID_HEADER;
use newsletter_api::startup::get_connection_pool;
use newsletter_api::startup::Application;
use newsletter_api::telemetry::get_subscriber;
use newsletter_api::telemetry::init_subscriber;
use once_cell::sync::Lazy;
use secrecy::Secret;
use serde_json::json;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::MockServer;

/// Logs are swallowed unless `TEST_LOG` is set:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // the two sinks have different types, hence two arms
    let outcome = match std::env::var("TEST_LOG") {
        Ok(_) => init_subscriber(get_subscriber("test", "debug", std::io::stdout)),
        Err(_) => init_subscriber(get_subscriber("test", "debug", std::io::sink)),
    };
    outcome.expect("init test subscriber");
});

#[derive(sqlx::FromRow, Debug)]
pub struct SubscriberRow {
    pub email: String,
    pub source: String,
    pub status: String,
    pub substack_synced: bool,
    pub sync_batch_id: Option<Uuid>,
    pub substack_sync_queued_at: Option<DateTime<Utc>>,
}

/// One parsed `export-pending` response
pub enum Export {
    Csv { batch_id: Uuid, rows: Vec<csv::StringRecord> },
    NothingPending,
}

pub struct TestApp {
    pub addr: String,
    pub pool: PgPool,
    /// stands in for the external mailing list
    pub list_server: MockServer,
    /// stands in for the CMS
    pub cms_server: MockServer,
    pub admin_token: String,
    pub webhook_secret: String,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_subscribe(
        &self,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_subscribe_raw(body.to_string(), None).await
    }

    /// Subscribe as if proxied for client `ip`
    pub async fn post_subscribe_from(
        &self,
        ip: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_subscribe_raw(body.to_string(), Some(ip)).await
    }

    pub async fn post_subscribe_raw(
        &self,
        body: String,
        forwarded_for: Option<&str>,
    ) -> reqwest::Response {
        let mut req = self
            .api_client
            .post(format!("{}/api/subscribe", self.addr))
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(ip) = forwarded_for {
            req = req.header("X-Forwarded-For", ip);
        }
        req.send().await.expect("execute request")
    }

    /// Add `n` distinct subscribers, each from its own address so the rate
    /// limiter stays out of the way
    pub async fn seed_subscribers(
        &self,
        n: usize,
    ) -> Vec<String> {
        let mut emails = vec![];
        for i in 0..n {
            let email = format!("reader{i}@example.com");
            let resp = self
                .post_subscribe_from(
                    &format!("10.0.{}.{}", i / 250, i % 250),
                    &json!({ "email": email, "source": "footer" }),
                )
                .await;
            assert_eq!(resp.status().as_u16(), 200, "seeding {email}");
            emails.push(email);
        }
        emails
    }

    pub async fn get_export_pending(
        &self,
        token: Option<&str>,
    ) -> reqwest::Response {
        let mut req = self
            .api_client
            .get(format!("{}/api/admin/export-pending", self.addr));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("execute request")
    }

    /// Export with the right token and parse whatever comes back
    pub async fn export(&self) -> Export { parse_export(self.get_export_pending(Some(&self.admin_token)).await).await }

    pub async fn post_mark_synced(
        &self,
        token: Option<&str>,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        let mut req = self
            .api_client
            .post(format!("{}/api/admin/mark-synced", self.addr))
            .json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("execute request")
    }

    pub async fn post_webhook(
        &self,
        secret: Option<&str>,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        let mut req = self
            .api_client
            .post(format!("{}/api/webhooks/subscriber-added", self.addr))
            .json(body);
        if let Some(secret) = secret {
            req = req.header("x-newsletter-webhook-secret", secret);
        }
        req.send().await.expect("execute request")
    }

    /// All rows, ordered by email
    pub async fn subscribers(&self) -> Vec<SubscriberRow> {
        sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT email, source, status, substack_synced, sync_batch_id,
                substack_sync_queued_at
            FROM newsletter_subscribers
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .expect("fetch subscribers")
    }
}

pub async fn parse_export(resp: reqwest::Response) -> Export {
    assert_eq!(resp.status().as_u16(), 200);
    match resp.headers().get(BATCH_ID_HEADER) {
        None => {
            let body: serde_json::Value = resp.json().await.unwrap();
            assert_eq!(body["success"], true);
            Export::NothingPending
        }
        Some(batch_id) => {
            let batch_id = Uuid::parse_str(batch_id.to_str().unwrap()).unwrap();
            let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
            assert!(content_type.starts_with("text/csv"), "{content_type}");
            let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_owned();
            assert!(disposition.starts_with("attachment"), "{disposition}");
            assert!(disposition.contains(&batch_id.to_string()), "{disposition}");

            let body = resp.text().await.unwrap();
            let mut reader = csv::Reader::from_reader(body.as_bytes());
            assert_eq!(
                reader.headers().unwrap().iter().collect::<Vec<_>>(),
                vec!["email", "subscribed_at", "source"]
            );
            let rows = reader.records().map(Result::unwrap).collect();
            Export::Csv { batch_id, rows }
        }
    }
}

/// Create a db with a random name and run the migrations in `migrations/`
/// against it, so that every test has a clean slate.
async fn configure_database(cfg: &DatabaseSettings) -> PgPool {
    let mut conn = PgConnection::connect_with(&cfg.connection_without_db())
        .await
        .expect("postgres must be running; run scripts/init_db.sh");
    conn.execute(format!(r#"CREATE DATABASE "{}";"#, cfg.database_name).as_str())
        .await
        .expect("create test db");

    let pool = PgPool::connect_with(cfg.connection()).await.expect("connect to test db");
    sqlx::migrate!().run(&pool).await.expect("failed to migrate");
    pool
}

pub async fn spawn_app() -> TestApp { spawn_app_with(|_| {}).await }

/// Spawn the app on a random port with its own db, mailing-list mock and CMS
/// mock. `customise` runs last and may override anything.
pub async fn spawn_app_with(customise: impl FnOnce(&mut Settings)) -> TestApp {
    Lazy::force(&TRACING);

    let list_server = MockServer::start().await;
    let cms_server = MockServer::start().await;
    let admin_token = Uuid::new_v4().to_string();
    let webhook_secret = Uuid::new_v4().to_string();

    let cfg = {
        let mut c = get_configuration().expect("read configuration");
        c.database.database_name = Uuid::new_v4().to_string();
        // port 0: let the OS pick
        c.application.port = 0;
        c.newsletter.admin_token = Some(Secret::new(admin_token.clone()));
        c.newsletter.webhook_secret = Some(Secret::new(webhook_secret.clone()));
        c.list_provider.endpoint = Some(format!("{}/subscribe", list_server.uri()));
        c.list_provider.timeout_milliseconds = 1000;
        c.cms.base_url = cms_server.uri();
        c.cms.timeout_milliseconds = 1000;
        customise(&mut c);
        c
    };

    configure_database(&cfg.database).await;

    let app = Application::build(cfg.clone()).await.expect("build app");
    let port = app.get_port();
    let addr = format!("http://localhost:{port}");
    tokio::spawn(app.run_until_stopped());

    TestApp {
        addr,
        pool: get_connection_pool(&cfg.database),
        list_server,
        cms_server,
        admin_token,
        webhook_secret,
        api_client: reqwest::Client::new(),
    }
}
