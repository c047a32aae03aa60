//! Producing side: the merged icon map and its per-icon-system cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::types::{CacheStatistics, IconKey, IconMapping, mapping_from_table};

/// Identity of the stock Bootstrap icon system, used to derive its cache key.
pub const BOOTSTRAP_ICON_SYSTEM: &str = r"theme_moonchild\output\icon_system_bootstrap";

/// Core pix icons mapped to Bootstrap Icons classes.
pub const CORE_ICON_TABLE: &[(&str, &str)] = &[
    ("core:a/search", "bi-search"),
    ("core:e/question", "bi-question-lg"),
    ("core:t/message", "bi-chat-square fs-5"),
    ("core:i/notifications", "bi-bell fs-5"),
    ("core:t/editstring", "bi-pencil"),
    ("core:i/settings", "bi-gear"),
    ("core:i/bulk_edit", "bi-pencil-square"),
    ("core:i/menu", "bi-three-dots-vertical"),
    ("core:t/delete", "bi-trash3"),
    ("core:i/dragdrop", "bi-arrows-move"),
    ("core:t/right", "bi-arrow-right"),
    ("core:t/copy", "bi-copy"),
    ("core:t/assignroles", "bi-person-gear"),
    ("core:t/groupv", "bi-person-circle"),
    ("core:e/cancel", "bi-x-lg"),
    ("core:t/blocks_drawer", "bi-chevron-left"),
    ("core:t/blocks_drawer_rtl", "bi-chevron-right"),
    ("core:t/add", "bi-plus-lg"),
    ("core:t/expandedchevron", "bi-chevron-down"),
    ("core:t/collapsedchevron", "bi-chevron-right"),
];

lazy_static! {
    static ref UNSAFE_KEY_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_]").expect("static pattern");
}

/// Cache key for an icon system identity: `mapping_` plus the identity with
/// every character outside `[a-zA-Z0-9_]` replaced by `_`.
pub fn map_cache_key(icon_system: &str) -> String {
    format!("mapping_{}", UNSAFE_KEY_CHARS.replace_all(icon_system, "_"))
}

/// Marker classes appended to a deprecated icon's glyph spec.
pub fn deprecation_suffix(key: &IconKey) -> String {
    format!(" deprecated deprecated-{}", key.source_key())
}

/// Contributes extra icon mappings on top of the base table.
pub trait IconMapProvider: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str {
        "anonymous"
    }

    fn contribute(&self) -> IconMapping;
}

impl<F> IconMapProvider for F
where
    F: Fn() -> IconMapping + Send + Sync,
{
    fn contribute(&self) -> IconMapping {
        self()
    }
}

/// Process-wide cache of computed mappings, one entry per icon system.
///
/// Entries are only ever removed by an explicit purge.
#[derive(Default)]
pub struct MapCache {
    entries: DashMap<String, Arc<IconMapping>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached mapping for `key`. Empty entries count as absent.
    pub fn get(&self, key: &str) -> Option<Arc<IconMapping>> {
        let found = self
            .entries
            .get(key)
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| Arc::clone(entry.value()));

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn set(&self, key: impl Into<String>, mapping: Arc<IconMapping>) {
        self.entries.insert(key.into(), mapping);
    }

    /// Drop one icon system's mapping. Returns whether an entry existed.
    pub fn purge(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            log::info!("Purged icon map cache entry '{}'", key);
        }
        removed
    }

    /// Drop every cached mapping.
    pub fn purge_all(&self) {
        let count = self.entries.len();
        self.entries.clear();
        log::info!("Purged {} icon map cache entries", count);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Builds the authoritative icon map from the base table, providers and
/// deprecation list.
pub struct MapSource {
    base: IconMapping,
    providers: Vec<Box<dyn IconMapProvider>>,
    deprecated: AHashSet<IconKey>,
    cache: Arc<MapCache>,
}

impl MapSource {
    /// A source seeded with the core Bootstrap table.
    pub fn new(cache: Arc<MapCache>) -> Result<Self> {
        Ok(Self::with_base_table(mapping_from_table(CORE_ICON_TABLE)?, cache))
    }

    /// A source seeded with a custom base table.
    pub fn with_base_table(base: IconMapping, cache: Arc<MapCache>) -> Self {
        Self {
            base,
            providers: Vec::new(),
            deprecated: AHashSet::new(),
            cache,
        }
    }

    /// Append a provider. Providers are merged in the order they were added.
    pub fn with_provider(mut self, provider: impl IconMapProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Flag icons as deprecated.
    pub fn with_deprecated(mut self, keys: impl IntoIterator<Item = IconKey>) -> Self {
        self.deprecated.extend(keys);
        self
    }

    pub fn cache(&self) -> &Arc<MapCache> {
        &self.cache
    }

    pub fn is_deprecated(&self, key: &IconKey) -> bool {
        self.deprecated.contains(key)
    }

    /// The mapping for `icon_system`, from cache when possible.
    pub fn get_icon_name_map(&self, icon_system: &str) -> Arc<IconMapping> {
        let cache_key = map_cache_key(icon_system);

        if let Some(mapping) = self.cache.get(&cache_key) {
            log::debug!("Icon map cache hit for '{}'", cache_key);
            return mapping;
        }

        log::info!("Building icon map for '{}'", icon_system);
        let mapping = Arc::new(self.build_mapping());
        self.cache.set(cache_key, Arc::clone(&mapping));
        mapping
    }

    /// Merge base table and providers, then annotate deprecated keys.
    ///
    /// Providers only fill keys nobody has set yet, so the base table and
    /// earlier providers win.
    pub fn build_mapping(&self) -> IconMapping {
        let mut mapping = self.base.clone();

        for provider in &self.providers {
            let contributed = provider.contribute();
            let before = mapping.len();
            for (key, glyph) in contributed {
                mapping.entry(key).or_insert(glyph);
            }
            log::debug!(
                "Provider '{}' added {} icons",
                provider.name(),
                mapping.len() - before
            );
        }

        for (key, glyph) in mapping.iter_mut() {
            if self.deprecated.contains(key) {
                glyph.push_str(&deprecation_suffix(key));
            }
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ToolProvider;

    impl IconMapProvider for ToolProvider {
        fn name(&self) -> &str {
            "tool_provider"
        }

        fn contribute(&self) -> IconMapping {
            mapping_from_table(&[
                ("core:a/search", "bi-binoculars"),
                ("tool_x:icon", "bi-tools"),
            ])
            .unwrap()
        }
    }

    fn search_only() -> IconMapping {
        mapping_from_table(&[("core:search", "bi-search")]).unwrap()
    }

    #[test]
    fn test_cache_key_is_sanitized() {
        assert_eq!(
            map_cache_key(BOOTSTRAP_ICON_SYSTEM),
            "mapping_theme_moonchild_output_icon_system_bootstrap"
        );
        assert_eq!(map_cache_key("a-b.c"), "mapping_a_b_c");
    }

    #[test]
    fn test_base_table_only() {
        let source = MapSource::with_base_table(search_only(), Arc::new(MapCache::new()));
        let mapping = source.get_icon_name_map("sys");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping[&IconKey::new("core", "search")], "bi-search");
    }

    #[test]
    fn test_core_table_loads() {
        let source = MapSource::new(Arc::new(MapCache::new())).unwrap();
        let mapping = source.get_icon_name_map(BOOTSTRAP_ICON_SYSTEM);
        assert_eq!(mapping.len(), CORE_ICON_TABLE.len());
        assert_eq!(mapping[&IconKey::new("core", "t/message")], "bi-chat-square fs-5");
    }

    #[test]
    fn test_providers_only_fill_unset_keys() {
        let second = || mapping_from_table(&[("tool_x:icon", "bi-wrench")]).unwrap();
        let source = MapSource::new(Arc::new(MapCache::new()))
            .unwrap()
            .with_provider(ToolProvider)
            .with_provider(second);

        let mapping = source.build_mapping();
        assert_eq!(mapping[&IconKey::new("core", "a/search")], "bi-search");
        assert_eq!(mapping[&IconKey::new("tool_x", "icon")], "bi-tools");
    }

    #[test]
    fn test_cache_hit_skips_rebuild() {
        let cache = Arc::new(MapCache::new());
        let source = MapSource::with_base_table(search_only(), Arc::clone(&cache));

        let first = source.get_icon_name_map("sys");
        let second = source.get_icon_name_map("sys");
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.statistics();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cached_entry_returned_verbatim() {
        let cache = Arc::new(MapCache::new());
        let planted = Arc::new(mapping_from_table(&[("core:planted", "bi-tree")]).unwrap());
        cache.set(map_cache_key("sys"), Arc::clone(&planted));

        let source = MapSource::with_base_table(search_only(), cache);
        assert!(Arc::ptr_eq(&source.get_icon_name_map("sys"), &planted));
    }

    #[test]
    fn test_empty_cache_entry_is_a_miss() {
        let cache = Arc::new(MapCache::new());
        cache.set(map_cache_key("sys"), Arc::new(IconMapping::new()));

        let source = MapSource::with_base_table(search_only(), cache);
        assert_eq!(source.get_icon_name_map("sys").len(), 1);
    }

    #[test]
    fn test_rebuild_after_purge_is_identical() {
        let cache = Arc::new(MapCache::new());
        let source = MapSource::new(Arc::clone(&cache))
            .unwrap()
            .with_provider(ToolProvider)
            .with_deprecated([IconKey::new("core", "t/copy")]);

        let first = source.get_icon_name_map("sys");
        assert!(cache.purge(&map_cache_key("sys")));
        let second = source.get_icon_name_map("sys");

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert_eq!(
            serde_json::to_string(&first.iter().collect::<Vec<_>>()).unwrap(),
            serde_json::to_string(&second.iter().collect::<Vec<_>>()).unwrap()
        );
    }

    #[test]
    fn test_deprecation_suffix_applied_once() {
        let deprecated = IconKey::new("core", "a/search");
        let source = MapSource::new(Arc::new(MapCache::new()))
            .unwrap()
            .with_provider(ToolProvider)
            .with_provider(ToolProvider)
            .with_deprecated([deprecated.clone(), deprecated.clone()]);

        let mapping = source.build_mapping();
        assert_eq!(
            mapping[&deprecated],
            "bi-search deprecated deprecated-core:a/search"
        );
        assert!(source.is_deprecated(&deprecated));
    }

    #[test]
    fn test_deprecated_key_absent_from_map_is_ignored() {
        let source = MapSource::with_base_table(search_only(), Arc::new(MapCache::new()))
            .with_deprecated([IconKey::new("core", "gone")]);
        let mapping = source.build_mapping();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping[&IconKey::new("core", "search")], "bi-search");
    }

    #[test]
    fn test_purge_all() {
        let cache = MapCache::new();
        cache.set("a", Arc::new(search_only()));
        cache.set("b", Arc::new(search_only()));
        cache.purge_all();
        assert!(cache.is_empty());
        assert!(!cache.purge("a"));
    }
}
