//! Configuration for the icon resolver

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IconMapError, Result};
use crate::transport::validate_theme_name;

/// Namespace prefix for persisted snapshots
pub const SNAPSHOT_NAMESPACE: &str = "core_iconsystem";

/// Icon system name used in the snapshot key
pub const ICON_SYSTEM_NAME: &str = "bootstrap";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for an [`IconResolver`](crate::IconResolver)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Site root used for image fallbacks and the service endpoint
    pub wwwroot: String,
    /// Theme whose map is resolved
    pub theme_name: String,
    /// Theme revision; also the service cache key
    pub theme_revision: i64,
    /// Whether image URLs use slash arguments
    pub slash_arguments: bool,

    /// Snapshot key namespace
    pub namespace: String,
    /// Icon system name in the snapshot key
    pub icon_system: String,
    /// Directory for file-backed snapshots
    pub snapshot_directory: PathBuf,

    /// Upper bound for one map fetch; `None` waits forever
    pub fetch_timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            wwwroot: "http://localhost".to_string(),
            theme_name: "moonchild".to_string(),
            theme_revision: -1,
            slash_arguments: true,
            namespace: SNAPSHOT_NAMESPACE.to_string(),
            icon_system: ICON_SYSTEM_NAME.to_string(),
            snapshot_directory: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("cache"))
                .join("glyphmap"),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

impl ResolverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `GLYPHMAP_*` environment variables.
    ///
    /// Recognised: `GLYPHMAP_WWWROOT`, `GLYPHMAP_THEME`, `GLYPHMAP_THEMEREV`,
    /// `GLYPHMAP_SLASHARGUMENTS`, `GLYPHMAP_SNAPSHOT_DIR`,
    /// `GLYPHMAP_FETCH_TIMEOUT_SECS` (`0` disables the timeout).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(wwwroot) = env::var("GLYPHMAP_WWWROOT") {
            config = config.with_wwwroot(wwwroot);
        }
        if let Ok(theme) = env::var("GLYPHMAP_THEME") {
            config = config.with_theme(theme)?;
        }
        if let Ok(rev) = env::var("GLYPHMAP_THEMEREV") {
            let rev = rev
                .trim()
                .parse::<i64>()
                .map_err(|e| IconMapError::Config(format!("GLYPHMAP_THEMEREV: {e}")))?;
            config = config.with_theme_revision(rev);
        }
        if let Ok(flag) = env::var("GLYPHMAP_SLASHARGUMENTS") {
            config.slash_arguments = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Ok(dir) = env::var("GLYPHMAP_SNAPSHOT_DIR") {
            config = config.with_snapshot_directory(PathBuf::from(dir));
        }
        if let Ok(secs) = env::var("GLYPHMAP_FETCH_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|e| IconMapError::Config(format!("GLYPHMAP_FETCH_TIMEOUT_SECS: {e}")))?;
            config.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Load a `.env` file, then read the environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            if let Err(e) = dotenvy::from_path(path) {
                log::warn!("Failed to load .env from {:?}: {}", path, e);
            }
        }
        Self::from_env()
    }

    pub fn with_wwwroot(mut self, wwwroot: impl Into<String>) -> Self {
        self.wwwroot = wwwroot.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the theme; rejected unless it is a valid theme identifier.
    pub fn with_theme(mut self, theme_name: impl Into<String>) -> Result<Self> {
        let theme_name = theme_name.into();
        validate_theme_name(&theme_name)?;
        self.theme_name = theme_name;
        Ok(self)
    }

    pub fn with_theme_revision(mut self, revision: i64) -> Self {
        self.theme_revision = revision;
        self
    }

    pub fn with_snapshot_directory(mut self, dir: PathBuf) -> Self {
        self.snapshot_directory = dir;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Let a fetch run for as long as it takes.
    pub fn without_fetch_timeout(mut self) -> Self {
        self.fetch_timeout = None;
        self
    }

    /// `"<namespace>/theme/<themeName>/core/iconmap-<system>"`
    pub fn snapshot_key(&self) -> String {
        format!(
            "{}/theme/{}/core/iconmap-{}",
            self.namespace, self.theme_name, self.icon_system
        )
    }

    /// Store prefix shared by every revision of this site: a CRC32 of `wwwroot`.
    pub fn site_prefix(&self) -> String {
        format!("{:08x}/", crc32fast::hash(self.wwwroot.as_bytes()))
    }

    /// Store prefix for this site at the current theme revision.
    pub fn revision_prefix(&self) -> String {
        format!("{}{}/", self.site_prefix(), self.theme_revision)
    }

    /// Key the snapshot is stored under. Scoped by site and theme revision so
    /// a revision bump or a different site never reads a stale map.
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.revision_prefix(), self.snapshot_key())
    }

    /// URL of the theme image for a pix icon, used when no glyph is mapped.
    pub fn image_url(&self, pix: &str, component: &str) -> String {
        let component = match component {
            "" | "moodle" => "core",
            other => other,
        };

        if self.theme_revision > 0 && self.slash_arguments {
            format!(
                "{}/theme/image.php/{}/{}/{}/{}",
                self.wwwroot, self.theme_name, component, self.theme_revision, pix
            )
        } else {
            format!(
                "{}/theme/image.php?theme={}&component={}&rev={}&image={}",
                self.wwwroot, self.theme_name, component, self.theme_revision, pix
            )
        }
    }
}
