//! Read-only service exposing the computed icon map per theme.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{IconMapError, Result};
use crate::fetch::{MapFetcher, MapRequest};
use crate::source::{BOOTSTRAP_ICON_SYSTEM, MapSource};
use crate::types::IconMapRecord;

/// Web service function name clients call to load the map.
pub const SERVICE_NAME: &str = "theme_moonchild_load_bootstrap_icon_system_map";

lazy_static! {
    static ref ALPHANUMEXT: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern");
}

/// Check a theme name is a non-empty `[A-Za-z0-9_-]` identifier.
pub fn validate_theme_name(theme_name: &str) -> Result<&str> {
    if ALPHANUMEXT.is_match(theme_name) {
        Ok(theme_name)
    } else {
        Err(IconMapError::validation(
            "themename",
            format!("'{theme_name}' is not an alphanumeric theme identifier"),
        ))
    }
}

struct TransportInner {
    source: Arc<MapSource>,
    /// theme name -> icon system identity
    themes: DashMap<String, String>,
}

/// Exposes `load_map(theme)` over a shared [`MapSource`].
///
/// Cloning is cheap and shares the theme registry.
#[derive(Clone)]
pub struct MapTransport {
    inner: Arc<TransportInner>,
}

impl MapTransport {
    pub fn new(source: Arc<MapSource>) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                source,
                themes: DashMap::new(),
            }),
        }
    }

    /// Register a theme using the stock Bootstrap icon system.
    pub fn register_theme(&self, theme_name: &str) -> Result<()> {
        self.register_theme_with_system(theme_name, BOOTSTRAP_ICON_SYSTEM)
    }

    /// Register a theme whose icons come from the given icon system identity.
    pub fn register_theme_with_system(&self, theme_name: &str, icon_system: &str) -> Result<()> {
        validate_theme_name(theme_name)?;
        self.inner
            .themes
            .insert(theme_name.to_string(), icon_system.to_string());
        log::debug!("Registered theme '{}' with icon system '{}'", theme_name, icon_system);
        Ok(())
    }

    pub fn source(&self) -> &Arc<MapSource> {
        &self.inner.source
    }

    /// The icon map for `theme_name` as flat records.
    pub fn load_map(&self, theme_name: &str) -> Result<Vec<IconMapRecord>> {
        let theme_name = validate_theme_name(theme_name)?;
        let icon_system = self
            .inner
            .themes
            .get(theme_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                IconMapError::validation("themename", format!("unknown theme '{theme_name}'"))
            })?;

        let mapping = self.inner.source.get_icon_name_map(&icon_system);
        let records = mapping
            .iter()
            .map(|(key, glyph)| IconMapRecord {
                component: key.component.clone(),
                pix: key.pix.clone(),
                to: glyph.clone(),
            })
            .collect();

        Ok(records)
    }
}

impl MapFetcher for MapTransport {
    fn fetch_map(&self, request: &MapRequest) -> BoxFuture<'static, Result<Vec<IconMapRecord>>> {
        let transport = self.clone();
        let theme_name = request.theme_name.clone();
        async move { transport.load_map(&theme_name) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MapCache;
    use crate::types::{IconKey, mapping_from_table};

    fn transport() -> MapTransport {
        let source = MapSource::new(Arc::new(MapCache::new())).unwrap();
        let transport = MapTransport::new(Arc::new(source));
        transport.register_theme("moonchild").unwrap();
        transport
    }

    #[test]
    fn test_validate_theme_name() {
        assert!(validate_theme_name("moonchild").is_ok());
        assert!(validate_theme_name("moon_child-2").is_ok());
        assert!(validate_theme_name("").is_err());
        assert!(validate_theme_name("../boost").is_err());
        assert!(validate_theme_name("moon child").is_err());
    }

    #[test]
    fn test_load_map_returns_records() {
        let records = transport().load_map("moonchild").unwrap();
        assert_eq!(records.len(), crate::source::CORE_ICON_TABLE.len());
        assert_eq!(
            records[0],
            IconMapRecord {
                component: "core".into(),
                pix: "a/search".into(),
                to: "bi-search".into(),
            }
        );
    }

    #[test]
    fn test_invalid_theme_rejected_before_source() {
        let transport = transport();
        let err = transport.load_map("moon/child").unwrap_err();
        assert!(matches!(err, IconMapError::Validation { param: "themename", .. }));
        assert!(transport.source().cache().is_empty());
    }

    #[test]
    fn test_unknown_theme_rejected() {
        let transport = transport();
        let err = transport.load_map("boost").unwrap_err();
        assert!(matches!(err, IconMapError::Validation { .. }));
        assert!(transport.source().cache().is_empty());
    }

    #[test]
    fn test_load_map_warms_cache() {
        let transport = transport();
        transport.load_map("moonchild").unwrap();
        transport.load_map("moonchild").unwrap();
        let stats = transport.source().cache().statistics();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_themes_share_cache_per_icon_system() {
        let base = mapping_from_table(&[("core:search", "bi-search")]).unwrap();
        let source = MapSource::with_base_table(base, Arc::new(MapCache::new()));
        let transport = MapTransport::new(Arc::new(source));
        transport.register_theme_with_system("one", "custom_system").unwrap();
        transport.register_theme_with_system("two", "custom_system").unwrap();

        transport.load_map("one").unwrap();
        let records = transport.load_map("two").unwrap();
        assert_eq!(records[0].client_key(), IconKey::new("core", "search").client_key());
        assert_eq!(transport.source().cache().statistics().entries, 1);
    }

    #[tokio::test]
    async fn test_fetch_map_via_trait() {
        let transport = transport();
        let request = MapRequest::new("moonchild", 1);
        let records = transport.fetch_map(&request).await.unwrap();
        assert!(records.iter().any(|r| r.to == "bi-gear"));
    }
}
