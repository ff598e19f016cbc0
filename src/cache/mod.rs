//! Process-local layer image cache.
//!
//! Holds the PNG bytes of recently served layers keyed by `(design, layer)`
//! together with a strong, content-derived validator. Entries are filled
//! lazily on read and removed (never rewritten) whenever the backing blob is
//! overwritten or deleted. There is no expiry and no size bound: layer counts
//! per design are small, and the cache lives only as long as the process.

mod keys;
mod lock;
mod store;

pub use keys::LayerKey;
pub use store::{CacheEntry, FillTicket, LayerCache, compute_validator};

pub(crate) const METRIC_LAYER_CACHE_HIT: &str = "shieldforge_layer_cache_hit_total";
pub(crate) const METRIC_LAYER_CACHE_MISS: &str = "shieldforge_layer_cache_miss_total";
pub(crate) const METRIC_LAYER_CACHE_INVALIDATE: &str = "shieldforge_layer_cache_invalidate_total";
pub(crate) const METRIC_LAYER_CACHE_ENTRIES: &str = "shieldforge_layer_cache_entries";
pub(crate) const METRIC_LAYER_FETCH_ERROR: &str = "shieldforge_layer_fetch_error_total";
