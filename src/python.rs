//! Python bindings for the icon resolver

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3_async_runtimes::tokio::future_into_py;

use crate::{IconMapError, IconResolver, ResolverConfig};

fn to_py_err(err: IconMapError) -> PyErr {
    match err {
        IconMapError::Validation { .. } | IconMapError::Config(_) => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Python wrapper for the icon resolver
#[pyclass(name = "IconResolver", module = "glyphmap")]
pub struct PyIconResolver {
    inner: Arc<IconResolver>,
}

#[pymethods]
impl PyIconResolver {
    #[new]
    #[pyo3(signature = (wwwroot, theme, theme_revision=-1, snapshot_directory=None, fetch_timeout_secs=None))]
    pub fn new(
        wwwroot: String,
        theme: String,
        theme_revision: i64,
        snapshot_directory: Option<String>,
        fetch_timeout_secs: Option<u64>,
    ) -> PyResult<Self> {
        let mut config = ResolverConfig::new()
            .with_wwwroot(wwwroot)
            .with_theme(theme)
            .map_err(to_py_err)?
            .with_theme_revision(theme_revision);

        if let Some(dir) = snapshot_directory {
            config = config.with_snapshot_directory(PathBuf::from(dir));
        }
        match fetch_timeout_secs {
            Some(0) => config = config.without_fetch_timeout(),
            Some(secs) => config = config.with_fetch_timeout(Duration::from_secs(secs)),
            None => {}
        }

        let resolver = IconResolver::over_http(config).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(resolver),
        })
    }

    /// Warm the icon map (awaitable)
    pub fn init<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        let inner = self.inner.clone();
        future_into_py(py, async move { inner.init().await.map_err(to_py_err) })
    }

    #[getter]
    pub fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    #[pyo3(signature = (key, component, title=None, template=None))]
    pub fn render_icon(
        &self,
        key: &str,
        component: &str,
        title: Option<&str>,
        template: Option<&str>,
    ) -> PyResult<String> {
        let template = template.unwrap_or(self.inner.template_name());
        self.inner
            .render_icon(key, component, title, template)
            .map_err(to_py_err)
    }

    /// Render context as a JSON string, for callers with their own templates
    #[pyo3(signature = (key, component, title=None))]
    pub fn icon_context(&self, key: &str, component: &str, title: Option<&str>) -> PyResult<String> {
        let context = self.inner.icon_context(key, component, title);
        serde_json::to_string(&context).map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    pub fn template_name(&self) -> &'static str {
        self.inner.template_name()
    }
}
