//! In-memory stand-ins for the queue and the store, for tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use woosync_core::WooCommerceServer;
use woosync_db::{Database, DbConfig};

use crate::cache::MemoryCache;
use crate::config::WorkerConfig;
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::queue::{JobOptions, JobQueue, SyncJob};
use crate::woocommerce::{ApiFactory, ApiResponse, WooCommerceApi};

// =============================================================================
// Queue
// =============================================================================

/// Keeps every enqueued job instead of running it.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<(SyncJob, JobOptions)>>,
}

impl RecordingQueue {
    pub fn jobs(&self) -> Vec<(SyncJob, JobOptions)> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    /// Returns and forgets the recorded jobs.
    pub fn take(&self) -> Vec<(SyncJob, JobOptions)> {
        self.jobs.lock().map(|mut j| std::mem::take(&mut *j)).unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: SyncJob, options: JobOptions) -> SyncResult<()> {
        self.jobs
            .lock()
            .map_err(|_| SyncError::Internal("recording queue poisoned".into()))?
            .push((job, options));
        Ok(())
    }
}

// =============================================================================
// Store
// =============================================================================

/// One call seen by [`FakeStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server: String,
    pub method: &'static str,
    pub endpoint: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct FakeStoreState {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<(String, String), (u16, Value)>>,
    unreachable: Mutex<HashSet<String>>,
}

/// A scripted WooCommerce for every server.
///
/// Unscripted GETs answer `200 {}`; unscripted PUTs echo the body.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<FakeStoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the answer for `endpoint` on `server` (GET and PUT alike).
    pub fn respond(&self, server: &str, endpoint: &str, status: u16, body: Value) {
        if let Ok(mut responses) = self.state.responses.lock() {
            responses.insert((server.to_string(), endpoint.to_string()), (status, body));
        }
    }

    /// Every call to `server` fails before reaching it.
    pub fn unreachable(&self, server: &str) {
        if let Ok(mut set) = self.state.unreachable.lock() {
            set.insert(server.to_string());
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn puts(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == "PUT").collect()
    }
}

impl ApiFactory for FakeStore {
    fn api_for(&self, server: &WooCommerceServer) -> SyncResult<Arc<dyn WooCommerceApi>> {
        Ok(Arc::new(FakeStoreApi {
            server: server.name.clone(),
            state: self.state.clone(),
        }))
    }
}

struct FakeStoreApi {
    server: String,
    state: Arc<FakeStoreState>,
}

impl FakeStoreApi {
    fn call(&self, method: &'static str, endpoint: &str, body: Option<&Value>) -> SyncResult<ApiResponse> {
        let url = format!("https://{}/wp-json/wc/v3/{}", self.server, endpoint);

        if let Ok(mut calls) = self.state.calls.lock() {
            calls.push(RecordedCall {
                server: self.server.clone(),
                method,
                endpoint: endpoint.to_string(),
                body: body.cloned(),
            });
        }

        let unreachable = self
            .state
            .unreachable
            .lock()
            .map(|set| set.contains(&self.server))
            .unwrap_or(false);
        if unreachable {
            return Err(SyncError::RequestFailed {
                url,
                message: "connection refused".into(),
            });
        }

        let scripted = self
            .state
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(&(self.server.clone(), endpoint.to_string())).cloned());

        let (status, value) = match (scripted, body) {
            (Some(answer), _) => answer,
            (None, Some(body)) => (200, body.clone()),
            (None, None) => (200, json!({})),
        };

        Ok(ApiResponse {
            status,
            url,
            body: value.to_string(),
        })
    }
}

#[async_trait]
impl WooCommerceApi for FakeStoreApi {
    async fn get(&self, endpoint: &str) -> SyncResult<ApiResponse> {
        self.call("GET", endpoint, None)
    }

    async fn put(&self, endpoint: &str, body: &Value) -> SyncResult<ApiResponse> {
        self.call("PUT", endpoint, Some(body))
    }
}

// =============================================================================
// Context
// =============================================================================

/// A context over an in-memory database, a [`RecordingQueue`] and a
/// [`FakeStore`].
pub struct TestHarness {
    pub ctx: SyncContext,
    pub queue: Arc<RecordingQueue>,
    pub store: FakeStore,
}

impl TestHarness {
    pub async fn new() -> SyncResult<Self> {
        Self::with_config(WorkerConfig::default()).await
    }

    pub async fn with_config(config: WorkerConfig) -> SyncResult<Self> {
        let db = Database::new(DbConfig::in_memory()).await?;
        let queue = Arc::new(RecordingQueue::default());
        let store = FakeStore::new();

        let ctx = SyncContext::new(
            db,
            queue.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(store.clone()),
            config,
        );

        Ok(TestHarness { ctx, queue, store })
    }
}

/// An enabled server with stock sync on and the given warehouses.
pub fn stock_server(name: &str, warehouses: &[&str]) -> WooCommerceServer {
    let mut server = WooCommerceServer::new(name, format!("https://{}", name));
    server.api_consumer_key = "ck_test".into();
    server.api_consumer_secret = "cs_test".into();
    server.enable_sync = true;
    server.enable_stock_level_synchronisation = true;
    server.warehouses = warehouses.iter().map(|w| w.to_string()).collect();
    server
}

/// An enabled server with price sync on `price_list` and no delay.
pub fn price_server(name: &str, price_list: &str) -> WooCommerceServer {
    let mut server = WooCommerceServer::new(name, format!("https://{}", name));
    server.api_consumer_key = "ck_test".into();
    server.api_consumer_secret = "cs_test".into();
    server.enable_sync = true;
    server.enable_price_list_sync = true;
    server.price_list = Some(price_list.to_string());
    server.price_list_delay_per_item = 0.0;
    server
}
