//! Design persistence: listing, loading, saving, and deleting designs while
//! keeping the layer cache coherent with the blob store.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{BlobStore, DesignsRepo, RepoError, StorageError};
use crate::cache::{LayerCache, LayerKey};
use crate::domain::designs::{
    DesignRecord, DesignSummaryRecord, LayerRecord, SaveManifest, layer_png_url,
    normalize_design_name, now_rfc3339, timestamp_millis,
};
use crate::domain::ids::DesignId;

const SOURCE: &str = "application::designs";
const PNG_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("design not found")]
    NotFound,
    /// Read-side table failure.
    #[error("{label}")]
    Lookup {
        label: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("{label}")]
    Storage {
        label: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("{label}")]
    Repo {
        label: &'static str,
        #[source]
        source: RepoError,
    },
}

impl DesignError {
    fn storage(label: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| Self::Storage { label, source }
    }

    fn lookup(label: &'static str) -> impl FnOnce(RepoError) -> Self {
        move |source| Self::Lookup { label, source }
    }

    fn repo(label: &'static str) -> impl FnOnce(RepoError) -> Self {
        move |source| Self::Repo { label, source }
    }
}

/// Entry of the design list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignSummary {
    pub id: String,
    pub name: Option<String>,
    pub updated: i64,
}

/// A design as handed to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignView {
    pub id: String,
    pub name: Option<String>,
    pub updated: i64,
    pub stamps: Value,
    pub layers: Vec<LayerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerView {
    pub layer_index: u32,
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub png_url: Option<String>,
}

/// Inputs of a save: the parsed manifest plus raw PNG bytes keyed by layer index.
#[derive(Debug, Clone, Default)]
pub struct SaveDesignCommand {
    pub manifest: SaveManifest,
    pub uploads: HashMap<u32, Bytes>,
}

#[derive(Clone)]
pub struct DesignService {
    repo: Arc<dyn DesignsRepo>,
    blobs: Arc<dyn BlobStore>,
    cache: Arc<LayerCache>,
}

impl DesignService {
    pub fn new(repo: Arc<dyn DesignsRepo>, blobs: Arc<dyn BlobStore>, cache: Arc<LayerCache>) -> Self {
        Self { repo, blobs, cache }
    }

    pub async fn list(&self) -> Result<Vec<DesignSummary>, DesignError> {
        let records = self
            .repo
            .list_designs()
            .await
            .map_err(DesignError::lookup("design list failed"))?;
        Ok(records.into_iter().map(DesignSummary::from).collect())
    }

    pub async fn create(&self, name: Option<&str>) -> Result<DesignSummary, DesignError> {
        let name = normalize_design_name(name);
        let record = self
            .repo
            .create_design(&name, &now_rfc3339())
            .await
            .map_err(DesignError::repo("failed to create design"))?;
        info!(target = SOURCE, design_id = %record.id, "design created");
        Ok(DesignSummary::from(record))
    }

    pub async fn load(&self, id: &DesignId) -> Result<DesignView, DesignError> {
        let design = self
            .repo
            .find_design(id)
            .await
            .map_err(DesignError::lookup("design lookup failed"))?
            .ok_or(DesignError::NotFound)?;
        let layers = self
            .repo
            .list_layers(id)
            .await
            .map_err(DesignError::lookup("layer lookup failed"))?;

        Ok(DesignView::build(id, design, layers))
    }

    /// Persist new layer bytes and metadata.
    ///
    /// Every blob write must succeed before any table row is touched. Each
    /// written layer is invalidated right after its upload; the cache is
    /// refilled lazily by the next read.
    pub async fn save(&self, id: &DesignId, command: SaveDesignCommand) -> Result<(), DesignError> {
        let SaveDesignCommand {
            manifest,
            mut uploads,
        } = command;

        let mut rows = Vec::with_capacity(manifest.layers.len());
        for entry in &manifest.layers {
            let key = LayerKey::new(id.clone(), entry.layer_index);
            if let Some(bytes) = uploads.remove(&entry.layer_index) {
                self.blobs
                    .put(&key.blob_path(), PNG_CONTENT_TYPE, bytes)
                    .await
                    .map_err(DesignError::storage("storage upload failed"))?;
                self.cache.invalidate(&key);
            }
            rows.push(entry.to_record(id));
        }

        if !uploads.is_empty() {
            let mut ignored: Vec<u32> = uploads.into_keys().collect();
            ignored.sort_unstable();
            warn!(
                target = SOURCE,
                design_id = %id,
                layers = ?ignored,
                "ignoring layer uploads without manifest entries"
            );
        }

        if !rows.is_empty() {
            self.repo
                .upsert_layers(&rows)
                .await
                .map_err(DesignError::repo("layers upsert failed"))?;
        }

        self.repo
            .touch_design(id, &manifest.stamps_or_empty(), &now_rfc3339())
            .await
            .map_err(DesignError::repo("design update failed"))?;

        info!(
            target = SOURCE,
            design_id = %id,
            layers = rows.len(),
            "design saved"
        );
        Ok(())
    }

    /// Delete a design, its layer blobs, and every cached layer image.
    ///
    /// Blobs go first, each followed by its cache invalidation; table rows
    /// are removed only once every blob is gone. A final sweep drops cache
    /// entries for layers whose rows were never listed. Retrying after a
    /// partial failure is safe.
    pub async fn delete(&self, id: &DesignId) -> Result<(), DesignError> {
        let layers = self
            .repo
            .list_layers(id)
            .await
            .map_err(DesignError::lookup("layer lookup failed"))?;

        for layer in &layers {
            let key = LayerKey::new(id.clone(), layer.layer_index);
            let canonical = key.blob_path();
            self.blobs
                .delete(&canonical)
                .await
                .map_err(DesignError::storage("storage delete failed"))?;
            if let Some(path) = layer.png_path.as_deref().filter(|path| *path != canonical) {
                self.blobs
                    .delete(path)
                    .await
                    .map_err(DesignError::storage("storage delete failed"))?;
            }
            self.cache.invalidate(&key);
        }

        self.repo
            .delete_layers(id)
            .await
            .map_err(DesignError::repo("layers delete failed"))?;
        self.repo
            .delete_design(id)
            .await
            .map_err(DesignError::repo("design delete failed"))?;

        let swept = self.cache.invalidate_all_for(id);
        info!(
            target = SOURCE,
            design_id = %id,
            layers = layers.len(),
            swept,
            "design deleted"
        );
        Ok(())
    }
}

impl From<DesignSummaryRecord> for DesignSummary {
    fn from(record: DesignSummaryRecord) -> Self {
        let updated = updated_or_zero(&record.id, record.updated_at.as_deref());
        Self {
            id: record.id,
            name: record.name,
            updated,
        }
    }
}

impl DesignView {
    fn build(id: &DesignId, design: DesignRecord, layers: Vec<LayerRecord>) -> Self {
        let updated = updated_or_zero(&design.id, design.updated_at.as_deref());
        let layers = layers
            .into_iter()
            .map(|layer| LayerView {
                png_url: layer
                    .png_path
                    .as_ref()
                    .map(|_| layer_png_url(id, layer.layer_index, updated)),
                layer_index: layer.layer_index,
                name: layer.name,
                visible: layer.visible,
            })
            .collect();

        Self {
            id: design.id,
            name: design.name,
            updated,
            stamps: match design.stamps_json {
                Some(Value::Null) | None => Value::Array(Vec::new()),
                Some(stamps) => stamps,
            },
            layers,
        }
    }
}

fn updated_or_zero(id: &str, updated_at: Option<&str>) -> i64 {
    let Some(raw) = updated_at else {
        return 0;
    };
    timestamp_millis(raw).unwrap_or_else(|| {
        warn!(
            target = SOURCE,
            design_id = id,
            updated_at = raw,
            "unparseable updated_at; using 0"
        );
        0
    })
}
