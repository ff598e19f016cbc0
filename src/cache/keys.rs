//! Cache key definitions.

use crate::domain::{designs::layer_blob_path, ids::DesignId};

/// One layer's image slot within one design.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerKey {
    pub design_id: DesignId,
    pub layer_index: u32,
}

impl LayerKey {
    pub fn new(design_id: DesignId, layer_index: u32) -> Self {
        Self {
            design_id,
            layer_index,
        }
    }

    /// Canonical object path of this layer in the blob store.
    pub fn blob_path(&self) -> String {
        layer_blob_path(&self.design_id, self.layer_index)
    }
}
