//! Object access to the bucket holding layer PNGs.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode, header::CONTENT_TYPE};
use tracing::debug;
use url::Url;

use crate::application::repos::{BlobStore, StorageError};

use super::RemoteClient;

const SOURCE: &str = "infra::remote::storage";

#[derive(Clone)]
pub struct StorageBucket {
    client: RemoteClient,
    bucket: String,
}

impl StorageBucket {
    pub fn new(client: RemoteClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        let segments = ["storage", "v1", "object", self.bucket.as_str()]
            .into_iter()
            .chain(path.split('/').filter(|segment| !segment.is_empty()));
        self.client
            .endpoint(segments)
            .ok_or_else(|| StorageError::transport("remote url cannot carry a path"))
    }
}

/// Whether a failed delete means the object was already gone. The store
/// reports this either as a plain 404 or as a 400 carrying a `not_found`
/// error payload. A missing bucket also answers `"statusCode":"404"` and must
/// stay an error.
fn is_absent(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || body.contains(r#""error":"not_found""#)
        || body.contains("Object not found")
}

#[async_trait]
impl BlobStore for StorageBucket {
    async fn fetch(&self, path: &str) -> Result<Bytes, StorageError> {
        let url = self.object_url(path)?;
        let response = self
            .client
            .request(Method::GET, url)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response.bytes().await.map_err(StorageError::transport)
    }

    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let url = self.object_url(path)?;
        let size = bytes.len();
        let response = self
            .client
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(target = SOURCE, path, size_bytes = size, "object stored");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let url = self.object_url(path)?;
        let response = self
            .client
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if is_absent(status, &body) {
            debug!(target = SOURCE, path, "object already absent");
            return Ok(());
        }
        Err(StorageError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
