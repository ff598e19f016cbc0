//! Design identifiers.
//!
//! Layer blob paths are derived from the design id, so the accepted alphabet
//! excludes path separators and dots: two distinct `(design, layer)` pairs can
//! never map onto the same object path.

use std::fmt;

use serde::Serialize;

use super::error::DomainError;

const MAX_DESIGN_ID_LEN: usize = 128;

/// Opaque identifier of a design as issued by the table store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DesignId(String);

impl DesignId {
    /// Validate a raw identifier taken from a URL or a store reply.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() {
            return Err(DomainError::validation("design id must not be empty"));
        }
        if raw.len() > MAX_DESIGN_ID_LEN {
            return Err(DomainError::validation(format!(
                "design id exceeds {MAX_DESIGN_ID_LEN} characters"
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_'))
        {
            return Err(DomainError::validation(format!(
                "design id contains unsupported character `{bad}`"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
