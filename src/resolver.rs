//! Client-side icon resolver.
//!
//! `init()` warms the map once per resolver: from the persisted snapshot when
//! one exists, otherwise with a single fetch shared by every concurrent
//! caller. After that `render_icon()` is a synchronous lookup.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::config::ResolverConfig;
use crate::error::{IconMapError, Result};
use crate::fetch::{HttpMapFetcher, MapFetcher, MapRequest};
use crate::storage::{FileStore, SnapshotStore};
use crate::template::{
    IconAttribute, IconContext, PIX_ICON_TEMPLATE, PixIconTemplate, TemplateRenderer, UnmappedIcon,
};
use crate::types::{ClientIconMap, GlyphSpec, IconMapRecord};

type LoadOutcome = std::result::Result<Arc<ClientIconMap>, IconMapError>;
type PendingLoad = Shared<BoxFuture<'static, LoadOutcome>>;

enum ResolverState {
    Unloaded,
    /// One load in flight; every `init()` awaits a clone of this handle
    Loading(PendingLoad),
    /// Terminal for the resolver's lifetime
    Loaded(Arc<ClientIconMap>),
}

/// Resolves `component/pix` icon names to glyph classes.
///
/// Create one per theme and share it by reference.
pub struct IconResolver {
    config: ResolverConfig,
    fetcher: Arc<dyn MapFetcher>,
    store: Arc<dyn SnapshotStore>,
    renderer: Arc<dyn TemplateRenderer>,
    state: Mutex<ResolverState>,
}

impl IconResolver {
    pub fn new(
        config: ResolverConfig,
        fetcher: Arc<dyn MapFetcher>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            renderer: Arc::new(PixIconTemplate),
            state: Mutex::new(ResolverState::Unloaded),
        }
    }

    /// Resolver fetching from `config.wwwroot` and persisting snapshots under
    /// `config.snapshot_directory`.
    pub fn over_http(config: ResolverConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpMapFetcher::new(config.wwwroot.clone()));
        let store = Arc::new(FileStore::new(&config.snapshot_directory)?);
        Ok(Self::new(config, fetcher, store))
    }

    /// Replace the stock pix icon renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Warm the icon map. Idempotent; concurrent calls share one load.
    ///
    /// On failure every waiting caller gets the same error and the resolver
    /// returns to unloaded, so a later call starts a fresh load.
    pub async fn init(&self) -> Result<()> {
        let pending = {
            let mut state = self.state.lock();
            match &*state {
                ResolverState::Loaded(_) => return Ok(()),
                ResolverState::Loading(pending) => {
                    log::debug!("Joining in-flight icon map load");
                    pending.clone()
                }
                ResolverState::Unloaded => {
                    let pending = self.start_load();
                    *state = ResolverState::Loading(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        let mut state = self.state.lock();
        let still_current = matches!(&*state, ResolverState::Loading(p) if p.ptr_eq(&pending));
        match outcome {
            Ok(map) => {
                if still_current {
                    log::info!(
                        "Icon map for theme '{}' loaded ({} icons)",
                        self.config.theme_name,
                        map.len()
                    );
                    *state = ResolverState::Loaded(map);
                }
                Ok(())
            }
            Err(e) => {
                if still_current {
                    log::warn!("Icon map load failed, will retry on next init: {}", e);
                    *state = ResolverState::Unloaded;
                }
                Err(e)
            }
        }
    }

    fn start_load(&self) -> PendingLoad {
        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let snapshot_key = self.config.storage_key();
        let site_prefix = self.config.site_prefix();
        let revision_prefix = self.config.revision_prefix();
        let request = MapRequest::new(self.config.theme_name.clone(), self.config.theme_revision);
        let timeout = self.config.fetch_timeout;

        async move {
            if let Some(map) = read_snapshot(store.as_ref(), &snapshot_key).await {
                log::debug!("Icon map restored from snapshot '{}'", snapshot_key);
                return Ok(Arc::new(map));
            }

            let records = fetch_records(fetcher.as_ref(), &request, timeout).await?;
            let map: ClientIconMap = records
                .into_iter()
                .map(|record| (record.client_key(), record.to))
                .collect();

            if let Err(e) = write_snapshot(store.as_ref(), &snapshot_key, &map).await {
                log::warn!("Failed to persist icon map snapshot: {}", e);
            }
            match store.prune(&site_prefix, &revision_prefix).await {
                Ok(0) => {}
                Ok(removed) => log::info!("Dropped {} stale icon map snapshots", removed),
                Err(e) => log::warn!("Failed to drop stale icon map snapshots: {}", e),
            }

            Ok(Arc::new(map))
        }
        .boxed()
        .shared()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.lock(), ResolverState::Loaded(_))
    }

    fn loaded_map(&self) -> Option<Arc<ClientIconMap>> {
        match &*self.state.lock() {
            ResolverState::Loaded(map) => Some(Arc::clone(map)),
            _ => None,
        }
    }

    /// Number of mapped icons, zero until loaded.
    pub fn mapped_count(&self) -> usize {
        self.loaded_map().map_or(0, |map| map.len())
    }

    /// Glyph spec for `component/key`, if mapped.
    pub fn glyph_for(&self, component: &str, key: &str) -> Option<GlyphSpec> {
        self.loaded_map()?
            .get(&format!("{component}/{key}"))
            .cloned()
    }

    /// Build the render context for an icon.
    ///
    /// Must follow a successful `init()`; before that every icon resolves to
    /// the image fallback.
    pub fn icon_context(&self, key: &str, component: &str, title: Option<&str>) -> IconContext {
        let glyph = match self.loaded_map() {
            Some(map) => map.get(&format!("{component}/{key}")).cloned(),
            None => {
                log::warn!(
                    "Icon '{}/{}' requested before the icon map was loaded",
                    component,
                    key
                );
                None
            }
        };
        let title = title.unwrap_or_default();

        let unmapped_icon = match glyph {
            Some(_) => None,
            None => Some(UnmappedIcon {
                attributes: vec![
                    IconAttribute::new("src", self.config.image_url(key, component)),
                    IconAttribute::new("alt", title),
                    IconAttribute::new("title", title),
                ],
            }),
        };

        IconContext {
            title: title.to_string(),
            alt: title.to_string(),
            key: glyph,
            unmapped_icon,
            aria_hidden: title.is_empty().then_some(true),
        }
    }

    /// Render one icon through `template`, trimming surrounding whitespace.
    pub fn render_icon(
        &self,
        key: &str,
        component: &str,
        title: Option<&str>,
        template: &str,
    ) -> Result<String> {
        let context = self.icon_context(key, component, title);
        let markup = self.renderer.render(template, &context)?;
        Ok(markup.trim().to_string())
    }

    /// The template callers should have ready before rendering.
    pub fn template_name(&self) -> &'static str {
        PIX_ICON_TEMPLATE
    }
}

async fn fetch_records(
    fetcher: &dyn MapFetcher,
    request: &MapRequest,
    timeout: Option<Duration>,
) -> Result<Vec<IconMapRecord>> {
    let fetch = fetcher.fetch_map(request);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .map_err(|_| IconMapError::FetchTimeout(limit.as_millis() as u64))?,
        None => fetch.await,
    }
}

/// Snapshot contents, or `None` when missing, unreadable or corrupt.
async fn read_snapshot(store: &dyn SnapshotStore, key: &str) -> Option<ClientIconMap> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::debug!("Icon map snapshot unreadable, fetching instead: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<Vec<(String, GlyphSpec)>>(&raw) {
        Ok(pairs) => Some(pairs.into_iter().collect()),
        Err(e) => {
            log::debug!("Ignoring corrupt icon map snapshot '{}': {}", key, e);
            None
        }
    }
}

async fn write_snapshot(store: &dyn SnapshotStore, key: &str, map: &ClientIconMap) -> Result<()> {
    let mut pairs: Vec<(&String, &GlyphSpec)> = map.iter().collect();
    pairs.sort();
    let encoded =
        serde_json::to_string(&pairs).map_err(|e| IconMapError::Serialization(e.to_string()))?;
    store.set(key, encoded).await
}
