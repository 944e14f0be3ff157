use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::PgConnectOptions;

use crate::cms_client::CmsClient;
use crate::list_client::ListClient;
use crate::list_client::RewriteRule;

/// Global configuration, loaded from `configuration/*.yaml` and `APP_*` env
/// vars. See `get_configuration`.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub newsletter: NewsletterSettings,
    pub list_provider: ListProviderSettings,
    pub cms: CmsSettings,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

/// Database configuration
#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub database_name: String,

    /// Should be `true` in production.
    pub require_ssl: bool,
}

impl DatabaseSettings {
    /// Connection to the named database. The password is never logged.
    pub fn connection(&self) -> PgConnectOptions {
        self.connection_without_db().database(&self.database_name)
    }

    /// Connection to the Postgres instance itself, without selecting a
    /// database. Used by the tests to create a throwaway db.
    pub fn connection_without_db(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .username(&self.username)
            .password(self.password.expose_secret())
            .host(&self.host)
            .port(self.port)
            .ssl_mode(match self.require_ssl {
                true => sqlx::postgres::PgSslMode::Require,
                false => sqlx::postgres::PgSslMode::Prefer,
            })
    }
}

/// How a new subscriber reaches the external mailing list.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Stamp the row as queued; an operator exports it later through
    /// `/api/admin/export-pending` and confirms with `/api/admin/mark-synced`.
    Batch,
    /// Call the list provider during the subscribe request.
    Inline,
}

#[derive(Deserialize, Clone)]
pub struct NewsletterSettings {
    /// Bearer token for `/api/admin/*`. When absent, every admin call is
    /// rejected.
    pub admin_token: Option<Secret<String>>,

    /// Value expected in `x-newsletter-webhook-secret`. When absent, every
    /// webhook call is rejected.
    pub webhook_secret: Option<Secret<String>>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub rate_limit_per_hour: u32,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub rate_limit_window_seconds: u64,

    pub sync_mode: SyncMode,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub export_limit: i64,
}

impl NewsletterSettings {
    pub fn rate_limit_window(&self) -> Duration { Duration::from_secs(self.rate_limit_window_seconds) }

    /// Reject values that would quietly disable a feature: a zero window
    /// turns the rate limiter off, and a non-positive export limit makes
    /// every export fail or export nothing.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.rate_limit_per_hour) {
            return Err(format!(
                "newsletter.rate_limit_per_hour must be within 1..=100, got {}",
                self.rate_limit_per_hour
            ));
        }
        if self.rate_limit_window_seconds < 1 {
            return Err("newsletter.rate_limit_window_seconds must be at least 1".to_string());
        }
        if self.export_limit < 1 {
            return Err(format!(
                "newsletter.export_limit must be at least 1, got {}",
                self.export_limit
            ));
        }
        Ok(())
    }
}

/// The third-party mailing list that subscribers are pushed to.
#[derive(Deserialize, Clone)]
pub struct ListProviderSettings {
    /// When absent, inline synchronization always reports `synced: false`.
    pub endpoint: Option<String>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,

    /// Applied in order to `endpoint`; every rule that matches yields one
    /// extra candidate URL.
    #[serde(default)]
    pub rewrite_rules: Vec<RewriteRule>,

    /// Public signup page offered to visitors when inline sync fails.
    pub signup_url: String,
}

impl ListProviderSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn client(&self) -> Result<ListClient, reqwest::Error> {
        ListClient::new(
            self.endpoint.clone(),
            self.rewrite_rules.clone(),
            self.timeout(),
        )
    }
}

/// The headless CMS backing the blog. Only its health endpoint is used here.
#[derive(Deserialize, Clone)]
pub struct CmsSettings {
    pub base_url: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl CmsSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn client(&self) -> Result<CmsClient, reqwest::Error> { CmsClient::new(self.base_url.clone(), self.timeout()) }
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid environment: {e}")),
        }
    }
}

/// Load `configuration/base.yaml`, then `configuration/{APP_ENVIRONMENT}.yaml`,
/// then `APP_`-prefixed env vars (`APP_NEWSLETTER__ADMIN_TOKEN=...` ->
/// `Settings.newsletter.admin_token`).
///
/// Missing fields, an unknown environment, or out-of-range newsletter limits
/// (see `NewsletterSettings::validate`) fail start-up.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Message(format!("could not get current dir: {e}")))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        // env vars are always strings; `serde-aux` takes care of the numbers
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Settings>()?;

    settings
        .newsletter
        .validate()
        .map_err(ConfigError::Message)?;

    Ok(settings)
}
