//! Icon name to glyph class resolution.
//!
//! The producing side ([`MapSource`], [`MapCache`], [`MapTransport`]) merges
//! the core icon table with provider contributions and caches the result per
//! icon system. The consuming side ([`IconResolver`]) loads that map once,
//! from a persisted snapshot or a single shared fetch, and then resolves
//! `component/pix` names synchronously.

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod source;
pub mod storage;
pub mod template;
pub mod transport;
pub mod types;

#[cfg(feature = "python-bindings")]
pub mod python;

pub use config::ResolverConfig;
pub use error::{IconMapError, Result};
pub use fetch::{HttpMapFetcher, MapFetcher, MapRequest};
pub use resolver::IconResolver;
pub use source::{IconMapProvider, MapCache, MapSource};
pub use storage::{FileStore, MemoryStore, SnapshotStore};
pub use template::{IconContext, PixIconTemplate, TemplateRenderer};
pub use transport::MapTransport;
pub use types::{CacheStatistics, GlyphSpec, IconKey, IconMapRecord, IconMapping};

#[cfg(feature = "python-bindings")]
use pyo3::prelude::*;

#[cfg(feature = "python-bindings")]
#[pymodule]
fn glyphmap(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let _ = env_logger::try_init();

    m.add_class::<python::PyIconResolver>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("PIX_ICON_TEMPLATE", template::PIX_ICON_TEMPLATE)?;

    Ok(())
}
