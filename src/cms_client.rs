use std::time::Duration;
use std::time::Instant;

use reqwest::header::ACCEPT;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde::Serialize;

/// Pings the headless CMS so that a host which idles out free-tier instances
/// keeps it warm.
pub struct CmsClient {
    http_client: Client,
    base_url: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PingStatus {
    /// 2xx from the health endpoint
    Ok,
    /// reachable, but not 2xx
    Degraded,
    /// unreachable or timed out
    Error,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PingReport {
    pub status: PingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_timeout: bool,
}

impl CmsClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn health_url(&self) -> String { format!("{}/api/health", self.base_url) }

    #[tracing::instrument(name = "Pinging CMS health endpoint", skip(self))]
    pub async fn ping(&self) -> PingReport {
        let start = Instant::now();
        let resp = self
            .http_client
            .get(self.health_url())
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await;

        match resp {
            Ok(resp) => {
                let http_status = resp.status();
                // the body is informational only
                let uptime_seconds = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|body| body.get("uptimeSeconds").and_then(|u| u.as_f64()));
                let status = match http_status.is_success() {
                    true => PingStatus::Ok,
                    false => PingStatus::Degraded,
                };
                let report = PingReport {
                    status,
                    http_status: Some(http_status.as_u16()),
                    duration_ms: start.elapsed().as_millis(),
                    uptime_seconds,
                    error: None,
                    is_timeout: false,
                };
                match status {
                    PingStatus::Ok => tracing::info!(?report, "CMS ping ok"),
                    _ => tracing::warn!(?report, "CMS ping degraded"),
                }
                report
            }
            Err(e) => {
                let report = PingReport {
                    status: PingStatus::Error,
                    http_status: None,
                    duration_ms: start.elapsed().as_millis(),
                    uptime_seconds: None,
                    error: Some(e.to_string()),
                    is_timeout: e.is_timeout(),
                };
                tracing::error!(?report, "CMS ping failed");
                report
            }
        }
    }
}
