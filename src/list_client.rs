use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::SubscriberEmail;

/// Replace the first occurrence of `from` in the configured endpoint with
/// `to`, producing an alternative candidate URL.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
}

impl RewriteRule {
    pub fn apply(
        &self,
        url: &str,
    ) -> Option<String> {
        (!self.from.is_empty() && url.contains(&self.from)).then(|| url.replacen(&self.from, &self.to, 1))
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    Json,
    Form,
}

/// Result of one `sync_subscriber` call. Failure is data, not an error.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SyncMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl SyncOutcome {
    fn failed(diagnostic: String) -> Self {
        Self {
            synced: false,
            endpoint: None,
            method: None,
            diagnostic: Some(diagnostic),
        }
    }
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
}

/// Client for the external mailing-list provider.
///
/// A single `reqwest::Client` is built once and shared (via `web::Data`), so
/// connections to the provider are pooled across requests.
pub struct ListClient {
    http_client: Client,
    endpoint: Option<String>,
    rewrite_rules: Vec<RewriteRule>,
}

impl ListClient {
    /// Fails if the TLS backend cannot be initialised. There is no fallback
    /// client: every attempt must carry `timeout`.
    pub fn new(
        endpoint: Option<String>,
        rewrite_rules: Vec<RewriteRule>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            rewrite_rules,
        })
    }

    /// The configured endpoint verbatim, then one rewritten variant per
    /// matching rule, in rule order, without duplicates.
    pub fn candidates(&self) -> Vec<String> {
        let Some(endpoint) = &self.endpoint else {
            return vec![];
        };
        let mut candidates = vec![endpoint.clone()];
        for url in self.rewrite_rules.iter().filter_map(|r| r.apply(endpoint)) {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        candidates
    }

    /// Register `email` with the provider. Each candidate gets a JSON `POST`,
    /// then a form `POST`; the first 2xx wins. There are no retries beyond
    /// the candidate list.
    #[tracing::instrument(name = "Syncing subscriber to mailing list", skip(self))]
    pub async fn sync_subscriber(
        &self,
        email: &SubscriberEmail,
    ) -> SyncOutcome {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return SyncOutcome::failed("no list provider endpoint configured".to_string());
        }

        let mut last_failure = String::new();
        for endpoint in candidates {
            let json_failure = match self.post(&endpoint, email, SyncMethod::Json).await {
                Ok(()) => return Self::succeeded(endpoint, SyncMethod::Json),
                Err(e) => e,
            };
            let form_failure = match self.post(&endpoint, email, SyncMethod::Form).await {
                Ok(()) => return Self::succeeded(endpoint, SyncMethod::Form),
                Err(e) => e,
            };

            last_failure = format!("{endpoint}: json {json_failure}, form {form_failure}");
            tracing::warn!(%endpoint, failure = %last_failure, "list provider candidate failed");
        }

        SyncOutcome::failed(last_failure)
    }

    fn succeeded(
        endpoint: String,
        method: SyncMethod,
    ) -> SyncOutcome {
        tracing::info!(%endpoint, ?method, "subscriber synced to mailing list");
        SyncOutcome {
            synced: true,
            endpoint: Some(endpoint),
            method: Some(method),
            diagnostic: None,
        }
    }

    /// `Err` holds a short description: the status code, or the transport
    /// error.
    async fn post(
        &self,
        endpoint: &str,
        email: &SubscriberEmail,
        method: SyncMethod,
    ) -> Result<(), String> {
        let body = SignupRequest {
            email: email.as_ref(),
        };
        let req = self
            .http_client
            .post(endpoint)
            .header(CACHE_CONTROL, "no-cache");
        let req = match method {
            SyncMethod::Json => req.json(&body),
            SyncMethod::Form => req.form(&body),
        };

        match req.send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(format!("status {}", resp.status().as_u16())),
            Err(e) if e.is_timeout() => Err("timed out".to_string()),
            Err(e) => Err(format!("error {e}")),
        }
    }
}
