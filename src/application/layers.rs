//! Layer image delivery with HTTP validator semantics.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::{BlobStore, StorageError};
use crate::cache::{
    CacheEntry, LayerCache, LayerKey, METRIC_LAYER_CACHE_HIT, METRIC_LAYER_CACHE_MISS,
    METRIC_LAYER_FETCH_ERROR,
};

const SOURCE: &str = "application::layers";

/// Outcome of a layer image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerDelivery {
    /// The client already holds these bytes.
    NotModified { validator: String },
    /// Full content must be sent.
    Content(CacheEntry),
}

impl LayerDelivery {
    pub fn validator(&self) -> &str {
        match self {
            Self::NotModified { validator } => validator,
            Self::Content(entry) => entry.validator(),
        }
    }
}

#[derive(Debug, Error)]
#[error("layer fetch failed for `{path}`")]
pub struct LayerFetchError {
    pub path: String,
    #[source]
    pub source: StorageError,
}

/// Read-through access to layer images.
#[derive(Clone)]
pub struct LayerDeliveryService {
    cache: Arc<LayerCache>,
    blobs: Arc<dyn BlobStore>,
}

impl LayerDeliveryService {
    pub fn new(cache: Arc<LayerCache>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { cache, blobs }
    }

    /// Resolve a layer request given the client's `If-None-Match` value.
    ///
    /// Validators are compared as exact strings. Fetch failures are returned
    /// to the caller and never cached.
    pub async fn deliver(
        &self,
        key: &LayerKey,
        if_none_match: Option<&str>,
    ) -> Result<LayerDelivery, LayerFetchError> {
        let entry = self.entry(key).await?;

        if if_none_match == Some(entry.validator()) {
            return Ok(LayerDelivery::NotModified {
                validator: entry.validator().to_string(),
            });
        }

        Ok(LayerDelivery::Content(entry))
    }

    async fn entry(&self, key: &LayerKey) -> Result<CacheEntry, LayerFetchError> {
        if let Some(entry) = self.cache.get(key) {
            counter!(METRIC_LAYER_CACHE_HIT).increment(1);
            return Ok(entry);
        }
        counter!(METRIC_LAYER_CACHE_MISS).increment(1);

        let ticket = self.cache.begin_fill();
        let path = key.blob_path();
        match self.blobs.fetch(&path).await {
            Ok(bytes) => {
                debug!(
                    target = SOURCE,
                    design_id = %key.design_id,
                    layer_index = key.layer_index,
                    size_bytes = bytes.len(),
                    "layer cache filled"
                );
                Ok(self.cache.complete_fill(ticket, key.clone(), bytes))
            }
            Err(source) => {
                counter!(METRIC_LAYER_FETCH_ERROR).increment(1);
                warn!(
                    target = SOURCE,
                    design_id = %key.design_id,
                    layer_index = key.layer_index,
                    error = %source,
                    "layer fetch failed"
                );
                Err(LayerFetchError { path, source })
            }
        }
    }
}
