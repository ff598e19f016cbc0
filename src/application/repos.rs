//! Traits describing the remote stores this service fronts.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::domain::designs::{DesignRecord, DesignSummaryRecord, LayerRecord};
use crate::domain::ids::DesignId;

/// Failure talking to the remote table store.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("table store replied {status}: {body}")]
    Status { status: u16, body: String },
    #[error("table store request failed: {0}")]
    Transport(String),
    #[error("table store reply could not be decoded: {0}")]
    Decode(String),
}

impl RepoError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    /// Remote status code, when the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn details(&self) -> String {
        match self {
            Self::Status { body, .. } => body.clone(),
            Self::Transport(message) | Self::Decode(message) => message.clone(),
        }
    }
}

/// Failure talking to the remote blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob store replied {status}: {body}")]
    Status { status: u16, body: String },
    #[error("blob store request failed: {0}")]
    Transport(String),
}

impl StorageError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// Diagnostic text surfaced to clients.
    pub fn details(&self) -> String {
        match self {
            Self::Status { body, .. } => body.clone(),
            Self::Transport(message) => message.clone(),
        }
    }
}

/// Access to the `designs` and `layers` tables.
#[async_trait]
pub trait DesignsRepo: Send + Sync {
    /// All designs, most recently updated first.
    async fn list_designs(&self) -> Result<Vec<DesignSummaryRecord>, RepoError>;

    async fn create_design(
        &self,
        name: &str,
        updated_at: &str,
    ) -> Result<DesignSummaryRecord, RepoError>;

    async fn find_design(&self, id: &DesignId) -> Result<Option<DesignRecord>, RepoError>;

    /// Layer rows of a design ordered by `layer_index`.
    async fn list_layers(&self, design_id: &DesignId) -> Result<Vec<LayerRecord>, RepoError>;

    /// Insert or replace rows keyed by `(design_id, layer_index)`.
    async fn upsert_layers(&self, rows: &[LayerRecord]) -> Result<(), RepoError>;

    /// Persist stamp metadata and bump `updated_at`.
    async fn touch_design(
        &self,
        id: &DesignId,
        stamps: &Value,
        updated_at: &str,
    ) -> Result<(), RepoError>;

    /// Delete every layer row of a design. Zero matching rows is success.
    async fn delete_layers(&self, design_id: &DesignId) -> Result<(), RepoError>;

    /// Delete the design row. A missing row is success.
    async fn delete_design(&self, id: &DesignId) -> Result<(), RepoError>;
}

/// Whole-object access to the bucket holding layer PNGs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Create or overwrite the object at `path`.
    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// Remove the object at `path`. An already absent object is success.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}
