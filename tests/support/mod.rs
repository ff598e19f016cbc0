//! In-memory stand-ins for the remote table store and blob bucket, plus a
//! router harness wired the same way `main` wires the real clients.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, Response, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use shieldforge::{
    application::{
        designs::DesignService,
        layers::LayerDeliveryService,
        repos::{BlobStore, DesignsRepo, RepoError, StorageError},
    },
    cache::LayerCache,
    domain::designs::{DesignRecord, DesignSummaryRecord, LayerRecord},
    domain::ids::DesignId,
    infra::http::{BrowserConfig, HttpState, build_router},
};
use tower::ServiceExt;

#[derive(Debug, Clone)]
struct StoredDesign {
    id: String,
    name: String,
    updated_at: String,
    stamps: Value,
}

#[derive(Default)]
struct TablesInner {
    designs: Vec<StoredDesign>,
    layers: BTreeMap<(String, u32), LayerRecord>,
    next_id: u64,
}

/// `designs` and `layers` tables held in memory.
#[derive(Default)]
pub struct MemoryTables {
    inner: Mutex<TablesInner>,
    fail_upserts: AtomicBool,
}

impl MemoryTables {
    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn layer_rows(&self, design_id: &str) -> Vec<LayerRecord> {
        let inner = self.inner.lock().expect("tables lock");
        inner
            .layers
            .values()
            .filter(|row| row.design_id == design_id)
            .cloned()
            .collect()
    }

    pub fn design_updated_at(&self, design_id: &str) -> Option<String> {
        let inner = self.inner.lock().expect("tables lock");
        inner
            .designs
            .iter()
            .find(|design| design.id == design_id)
            .map(|design| design.updated_at.clone())
    }

    pub fn has_design(&self, design_id: &str) -> bool {
        self.design_updated_at(design_id).is_some()
    }
}

#[async_trait]
impl DesignsRepo for MemoryTables {
    async fn list_designs(&self) -> Result<Vec<DesignSummaryRecord>, RepoError> {
        let inner = self.inner.lock().expect("tables lock");
        let mut designs: Vec<_> = inner.designs.clone();
        designs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(designs
            .into_iter()
            .map(|design| DesignSummaryRecord {
                id: design.id,
                name: Some(design.name),
                updated_at: Some(design.updated_at),
            })
            .collect())
    }

    async fn create_design(
        &self,
        name: &str,
        updated_at: &str,
    ) -> Result<DesignSummaryRecord, RepoError> {
        let mut inner = self.inner.lock().expect("tables lock");
        inner.next_id += 1;
        let design = StoredDesign {
            id: format!("design-{}", inner.next_id),
            name: name.to_string(),
            updated_at: updated_at.to_string(),
            stamps: json!([]),
        };
        inner.designs.push(design.clone());
        Ok(DesignSummaryRecord {
            id: design.id,
            name: Some(design.name),
            updated_at: Some(design.updated_at),
        })
    }

    async fn find_design(&self, id: &DesignId) -> Result<Option<DesignRecord>, RepoError> {
        let inner = self.inner.lock().expect("tables lock");
        Ok(inner
            .designs
            .iter()
            .find(|design| design.id == id.as_str())
            .map(|design| DesignRecord {
                id: design.id.clone(),
                name: Some(design.name.clone()),
                updated_at: Some(design.updated_at.clone()),
                stamps_json: Some(design.stamps.clone()),
            }))
    }

    async fn list_layers(&self, design_id: &DesignId) -> Result<Vec<LayerRecord>, RepoError> {
        Ok(self.layer_rows(design_id.as_str()))
    }

    async fn upsert_layers(&self, rows: &[LayerRecord]) -> Result<(), RepoError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(RepoError::Status {
                status: 503,
                body: "table store unavailable".to_string(),
            });
        }
        let mut inner = self.inner.lock().expect("tables lock");
        for row in rows {
            inner
                .layers
                .insert((row.design_id.clone(), row.layer_index), row.clone());
        }
        Ok(())
    }

    async fn touch_design(
        &self,
        id: &DesignId,
        stamps: &Value,
        updated_at: &str,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("tables lock");
        if let Some(design) = inner
            .designs
            .iter_mut()
            .find(|design| design.id == id.as_str())
        {
            design.stamps = stamps.clone();
            design.updated_at = updated_at.to_string();
        }
        Ok(())
    }

    async fn delete_layers(&self, design_id: &DesignId) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("tables lock");
        inner
            .layers
            .retain(|(owner, _), _| owner != design_id.as_str());
        Ok(())
    }

    async fn delete_design(&self, id: &DesignId) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("tables lock");
        inner.designs.retain(|design| design.id != id.as_str());
        Ok(())
    }
}

/// Bucket held in memory. Counts fetches and can be told to fail writes,
/// refuse deletes or slow fetches down.
#[derive(Default)]
pub struct MemoryBucket {
    objects: Mutex<HashMap<String, Bytes>>,
    fetches: AtomicUsize,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
}

impl MemoryBucket {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().expect("delay lock") = Some(delay);
    }

    pub fn object(&self, path: &str) -> Option<Bytes> {
        self.objects.lock().expect("bucket lock").get(path).cloned()
    }

    /// Write an object behind the service's back.
    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .expect("bucket lock")
            .insert(path.to_string(), Bytes::copy_from_slice(bytes));
    }

    /// Remove an object behind the service's back.
    pub fn remove(&self, path: &str) {
        self.objects.lock().expect("bucket lock").remove(path);
    }
}

#[async_trait]
impl BlobStore for MemoryBucket {
    async fn fetch(&self, path: &str) -> Result<Bytes, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.object(path).ok_or_else(|| StorageError::Status {
            status: 400,
            body: r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#
                .to_string(),
        })
    }

    async fn put(&self, path: &str, _content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                status: 500,
                body: "bucket write refused".to_string(),
            });
        }
        self.objects
            .lock()
            .expect("bucket lock")
            .insert(path.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                status: 500,
                body: "bucket delete refused".to_string(),
            });
        }
        self.objects.lock().expect("bucket lock").remove(path);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub tables: Arc<MemoryTables>,
    pub bucket: Arc<MemoryBucket>,
    pub cache: Arc<LayerCache>,
}

impl TestApp {
    pub fn new() -> Self {
        let tables = Arc::new(MemoryTables::default());
        let bucket = Arc::new(MemoryBucket::default());
        let cache = Arc::new(LayerCache::new());

        let repo: Arc<dyn DesignsRepo> = tables.clone();
        let blobs: Arc<dyn BlobStore> = bucket.clone();
        let state = HttpState {
            designs: Arc::new(DesignService::new(repo, blobs.clone(), cache.clone())),
            layers: Arc::new(LayerDeliveryService::new(cache.clone(), blobs)),
            browser_config: Arc::new(BrowserConfig {
                supabase_url: "https://project.example.co".to_string(),
                supabase_anon_key: "anon-key".to_string(),
                supabase_bucket: "ShieldBucket".to_string(),
            }),
            max_request_bytes: 1024 * 1024,
        };

        Self {
            router: build_router(state),
            tables,
            bucket,
            cache,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn get(&self, uri: &str, if_none_match: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(validator) = if_none_match {
            builder = builder.header(header::IF_NONE_MATCH, validator);
        }
        self.send(builder.body(Body::empty()).expect("request should build"))
            .await
    }

    pub async fn create_design(&self, name: &str) -> String {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/designs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "name": name }).to_string()))
            .expect("request should build");
        let response = self.send(request).await;
        assert!(response.status().is_success(), "create failed");
        let body = body_json(response).await;
        body["id"].as_str().expect("design id").to_string()
    }

    pub async fn save(&self, design_id: &str, layers: &[(u32, &[u8])]) -> Response<Body> {
        let entries: Vec<Value> = layers
            .iter()
            .map(|(index, _)| json!({ "layer_index": index, "name": format!("L{index}"), "visible": true }))
            .collect();
        let meta = json!({ "layers": entries, "stamps": [] }).to_string();
        self.send(save_request(design_id, Some(&meta), layers)).await
    }

    pub async fn delete(&self, design_id: &str) -> Response<Body> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/designs/{design_id}"))
            .body(Body::empty())
            .expect("request should build");
        self.send(request).await
    }
}

const BOUNDARY: &str = "shieldforge-test-boundary";

/// Build a multipart save request with an optional `meta` part and one
/// `layer_<index>` file part per entry.
pub fn save_request(design_id: &str, meta: Option<&str>, layers: &[(u32, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(meta) = meta {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"meta\"\r\n\r\n{meta}\r\n"
            )
            .as_bytes(),
        );
    }
    for (index, bytes) in layers {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"layer_{index}\"; filename=\"layer_{index}.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(format!("/api/designs/{design_id}/save"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request should build")
}

pub fn layer_uri(design_id: &str, layer_index: u32) -> String {
    format!("/api/designs/{design_id}/layers/{layer_index}.png")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("body should be json")
}

pub fn etag(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|value: &HeaderValue| value.to_str().ok())
        .expect("etag header")
        .to_string()
}
