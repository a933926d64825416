//! # WooCommerce REST Client
//!
//! The only code in WooSync that talks to a store.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One WooCommerce call                                 │
//! │                                                                         │
//! │  StockSynchronizer / PriceSynchronizer                                 │
//! │       │  api.put("products/57/variations/812", {"stock_quantity": 13}) │
//! │       ▼                                                                 │
//! │  WooCommerceClient                                                     │
//! │  ├── URL  = {server_url}/wp-json/{api_version}/{endpoint}              │
//! │  ├── Auth = HTTP basic (consumer key : consumer secret)                │
//! │  ├── Timeout = http.timeout_secs (default 40 s)                        │
//! │  └── TLS verification = http.verify_ssl                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiResponse { status, url, body }  (any status, caller decides)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  woocommerce_request_log row (method, url, bodies, status, elapsed)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Non-2xx responses come back as `Ok(ApiResponse)`; only calls that never
//! produced a response are `Err`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use woosync_core::{RequestLogEntry, WooCommerceServer};
use woosync_db::Database;

use crate::config::HttpSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Trait
// =============================================================================

/// A store response, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// The request URL.
    pub url: String,
    pub body: String,
}

impl ApiResponse {
    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> SyncResult<Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| SyncError::InvalidResponse(format!("{} from {}", e, self.url)))
    }

    /// Turns a non-2xx response into [`SyncError::HttpStatus`].
    pub fn error_for_status(self) -> SyncResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SyncError::HttpStatus {
                status: self.status,
                url: self.url,
                body: self.body,
            })
        }
    }
}

/// REST calls against one store.
#[async_trait]
pub trait WooCommerceApi: Send + Sync {
    /// `GET {endpoint}`.
    async fn get(&self, endpoint: &str) -> SyncResult<ApiResponse>;

    /// `PUT {endpoint}` with a JSON body.
    async fn put(&self, endpoint: &str, body: &Value) -> SyncResult<ApiResponse>;
}

/// Builds a [`WooCommerceApi`] for a server record.
pub trait ApiFactory: Send + Sync {
    fn api_for(&self, server: &WooCommerceServer) -> SyncResult<Arc<dyn WooCommerceApi>>;
}

// =============================================================================
// reqwest Implementation
// =============================================================================

/// Builds [`WooCommerceClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct HttpApiFactory {
    http: reqwest::Client,
    settings: HttpSettings,
    request_log: Option<Database>,
}

impl HttpApiFactory {
    /// Creates the shared reqwest client.
    ///
    /// ## Arguments
    /// * `settings` - timeout, TLS verification, API namespace
    /// * `db` - where request log rows go (ignored when `log_requests` is off)
    pub fn new(settings: HttpSettings, db: Database) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .user_agent(concat!("woosync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let request_log = settings.log_requests.then_some(db);

        Ok(HttpApiFactory {
            http,
            settings,
            request_log,
        })
    }
}

impl ApiFactory for HttpApiFactory {
    fn api_for(&self, server: &WooCommerceServer) -> SyncResult<Arc<dyn WooCommerceApi>> {
        let client = WooCommerceClient::new(
            self.http.clone(),
            server,
            &self.settings,
            self.request_log.clone(),
        )?;
        Ok(Arc::new(client))
    }
}

/// REST client for one store.
pub struct WooCommerceClient {
    http: reqwest::Client,
    /// `{server_url}/wp-json/{api_version}/`
    base_url: url::Url,
    consumer_key: String,
    consumer_secret: String,
    timeout_secs: u64,
    request_log: Option<Database>,
}

impl WooCommerceClient {
    pub fn new(
        http: reqwest::Client,
        server: &WooCommerceServer,
        settings: &HttpSettings,
        request_log: Option<Database>,
    ) -> SyncResult<Self> {
        let base = format!(
            "{}/wp-json/{}/",
            server.woocommerce_server_url.trim().trim_end_matches('/'),
            settings.api_version.trim_matches('/')
        );
        let base_url = url::Url::parse(&base)?;

        Ok(WooCommerceClient {
            http,
            base_url,
            consumer_key: server.api_consumer_key.clone(),
            consumer_secret: server.api_consumer_secret.clone(),
            timeout_secs: settings.timeout_secs,
            request_log,
        })
    }

    /// Absolute URL of an endpoint.
    pub fn url_for(&self, endpoint: &str) -> SyncResult<url::Url> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> SyncResult<ApiResponse> {
        let url = self.url_for(endpoint)?;
        let started = Instant::now();

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret));
        if let Some(body) = body {
            request = request.json(body);
        }

        let outcome = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                response
                    .text()
                    .await
                    .map(|text| ApiResponse {
                        status,
                        url: url.to_string(),
                        body: text,
                    })
                    .map_err(SyncError::from)
            }
            Err(e) if e.is_timeout() => Err(SyncError::Timeout(self.timeout_secs)),
            Err(e) => Err(SyncError::from(e)),
        };

        let elapsed_ms = started.elapsed().as_millis() as i64;
        debug!(
            method = %method,
            url = %url,
            elapsed_ms,
            status = ?outcome.as_ref().map(|r| r.status).ok(),
            "WooCommerce request"
        );

        self.log_request(method.as_str(), url.as_str(), endpoint, body, &outcome, elapsed_ms)
            .await;

        outcome
    }

    async fn log_request(
        &self,
        method: &str,
        url: &str,
        endpoint: &str,
        body: Option<&Value>,
        outcome: &SyncResult<ApiResponse>,
        elapsed_ms: i64,
    ) {
        let Some(db) = &self.request_log else {
            return;
        };

        let (status_code, response_body, error) = match outcome {
            Ok(r) => (Some(i64::from(r.status)), Some(r.body.clone()), None),
            Err(e) => (None, None, Some(e.to_string())),
        };

        let entry = RequestLogEntry {
            id: Uuid::new_v4().to_string(),
            method: method.to_string(),
            url: url.to_string(),
            endpoint: endpoint.to_string(),
            request_body: body.map(Value::to_string),
            status_code,
            response_body,
            error,
            elapsed_ms,
            created_at: Utc::now(),
        };

        if let Err(e) = db.request_log().insert(&entry).await {
            warn!(error = %e, url = %url, "Failed to write request log");
        }
    }
}

#[async_trait]
impl WooCommerceApi for WooCommerceClient {
    async fn get(&self, endpoint: &str) -> SyncResult<ApiResponse> {
        self.send(reqwest::Method::GET, endpoint, None).await
    }

    async fn put(&self, endpoint: &str, body: &Value) -> SyncResult<ApiResponse> {
        self.send(reqwest::Method::PUT, endpoint, Some(body)).await
    }
}

// =============================================================================
// Tests
// =============================================================================
