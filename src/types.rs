//! Core types shared by the map source, transport and resolver.

use std::fmt;

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IconMapError, Result};

/// Class list selecting a glyph from the icon font, e.g. `"bi-chat-square fs-5"`
pub type GlyphSpec = String;

/// Producing-side mapping. Insertion order is kept so transport output is stable.
pub type IconMapping = IndexMap<IconKey, GlyphSpec>;

/// Consumer-side mapping keyed by the `"{component}/{pix}"` string form.
pub type ClientIconMap = AHashMap<String, GlyphSpec>;

/// Identifies a requestable icon by owning component and pix name.
///
/// Pix names may contain `/` (`a/search`), so the producing side writes keys
/// as `component:pix` while the consumer joins them as `component/pix`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IconKey {
    pub component: String,
    pub pix: String,
}

impl IconKey {
    pub fn new(component: impl Into<String>, pix: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            pix: pix.into(),
        }
    }

    /// Parse a `component:pix` table key. The split happens at the first `:`.
    pub fn parse_source(key: &str) -> Result<Self> {
        match key.split_once(':') {
            Some((component, pix)) if !component.is_empty() && !pix.is_empty() => {
                Ok(Self::new(component, pix))
            }
            _ => Err(IconMapError::validation(
                "iconkey",
                format!("'{key}' is not of the form component:pix"),
            )),
        }
    }

    /// The `component:pix` form used by icon tables and deprecation lists.
    pub fn source_key(&self) -> String {
        format!("{}:{}", self.component, self.pix)
    }

    /// The `component/pix` form used by the resolver and the snapshot.
    pub fn client_key(&self) -> String {
        format!("{}/{}", self.component, self.pix)
    }
}

impl fmt::Display for IconKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.pix)
    }
}

/// Build a mapping from `component:pix` keyed pairs.
///
/// Duplicate keys keep the first value.
pub fn mapping_from_table(table: &[(&str, &str)]) -> Result<IconMapping> {
    let mut mapping = IconMapping::with_capacity(table.len());
    for (from, to) in table {
        mapping
            .entry(IconKey::parse_source(from)?)
            .or_insert_with(|| (*to).to_string());
    }
    Ok(mapping)
}

/// One row of the transport response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconMapRecord {
    /// The component for the icon
    pub component: String,
    /// Value to map the icon from
    pub pix: String,
    /// Value to map the icon to
    pub to: GlyphSpec,
}

impl IconMapRecord {
    pub fn client_key(&self) -> String {
        format!("{}/{}", self.component, self.pix)
    }
}

/// Counters for the producing-side map cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Number of cached theme mappings
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that required a rebuild
    pub misses: u64,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}
