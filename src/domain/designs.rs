//! Design and layer records mirrored from the remote table store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

use super::ids::DesignId;

/// Fallback name for designs created without one.
pub const UNTITLED_DESIGN: &str = "Untitled";

/// Object path of a layer PNG inside the blob bucket.
///
/// Injective over `(design_id, layer_index)` because [`DesignId`] never
/// contains `/` or `.`.
pub fn layer_blob_path(design_id: &DesignId, layer_index: u32) -> String {
    format!("layers/{design_id}/layer_{layer_index}.png")
}

/// Same-origin URL the browser uses to load a layer image.
///
/// `version` is the design's last-modified time in milliseconds and only
/// serves to give every saved revision a distinct URL.
pub fn layer_png_url(design_id: &DesignId, layer_index: u32, version: i64) -> String {
    format!("/api/designs/{design_id}/layers/{layer_index}.png?v={version}")
}

/// Row of the `designs` table as returned by list queries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DesignSummaryRecord {
    #[serde(deserialize_with = "deserialize_remote_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Full row of the `designs` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DesignRecord {
    #[serde(deserialize_with = "deserialize_remote_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub stamps_json: Option<Value>,
}

/// Row of the `layers` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub design_id: String,
    pub layer_index: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub png_path: Option<String>,
}

/// Metadata part of a save request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SaveManifest {
    #[serde(default)]
    pub layers: Vec<LayerManifestEntry>,
    #[serde(default)]
    pub stamps: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerManifestEntry {
    pub layer_index: u32,
    #[serde(default)]
    pub name: Option<String>,
    /// Absent means visible; an explicit `null` means hidden.
    #[serde(default = "visible_by_default", deserialize_with = "deserialize_visible")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

fn deserialize_visible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl SaveManifest {
    /// Stamp metadata to persist; absent or `null` becomes an empty list.
    pub fn stamps_or_empty(&self) -> Value {
        match &self.stamps {
            Some(Value::Null) | None => Value::Array(Vec::new()),
            Some(value) => value.clone(),
        }
    }
}

impl LayerManifestEntry {
    /// Build the row persisted for this layer. The blob path is always the
    /// canonical one, whether or not new bytes accompany the save.
    pub fn to_record(&self, design_id: &DesignId) -> LayerRecord {
        let name = self
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Layer {}", u64::from(self.layer_index) + 1));

        LayerRecord {
            design_id: design_id.to_string(),
            layer_index: self.layer_index,
            name: Some(name),
            visible: Some(self.visible),
            png_path: Some(layer_blob_path(design_id, self.layer_index)),
        }
    }
}

/// Normalise a user-supplied design name.
pub fn normalize_design_name(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        UNTITLED_DESIGN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Convert a table-store timestamp to epoch milliseconds.
///
/// Returns `None` when the value cannot be parsed. Timestamps without an
/// offset are read as UTC.
pub fn timestamp_millis(raw: &str) -> Option<i64> {
    let parsed = OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
        let format = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(raw, &format)
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    })?;

    i64::try_from(parsed.unix_timestamp_nanos() / 1_000_000).ok()
}

/// Render "now" the way the table store expects it.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}

fn deserialize_remote_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RemoteId {
        Text(String),
        Number(i64),
    }

    Ok(match RemoteId::deserialize(deserializer)? {
        RemoteId::Text(text) => text,
        RemoteId::Number(number) => number.to_string(),
    })
}
