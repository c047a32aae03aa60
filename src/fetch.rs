//! Fetching the icon map from a remote service.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{IconMapError, Result};
use crate::transport::SERVICE_NAME;
use crate::types::IconMapRecord;

/// Parameters for a single map fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    pub theme_name: String,
    /// Theme revision, used by the service layer as its response cache key
    pub cache_key: i64,
}

impl MapRequest {
    pub fn new(theme_name: impl Into<String>, cache_key: i64) -> Self {
        Self {
            theme_name: theme_name.into(),
            cache_key,
        }
    }
}

/// Something that can answer a [`MapRequest`].
///
/// The returned future is `'static` so it can be shared between callers.
pub trait MapFetcher: Send + Sync {
    fn fetch_map(&self, request: &MapRequest) -> BoxFuture<'static, Result<Vec<IconMapRecord>>>;
}

#[derive(Debug, Deserialize)]
struct ServiceException {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errorcode: String,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    error: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    exception: Option<ServiceException>,
}

/// Calls the map service through the ajax web-service endpoint.
#[derive(Clone)]
pub struct HttpMapFetcher {
    client: reqwest::Client,
    wwwroot: String,
}

impl HttpMapFetcher {
    pub fn new(wwwroot: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), wwwroot)
    }

    pub fn with_client(client: reqwest::Client, wwwroot: impl Into<String>) -> Self {
        let wwwroot = wwwroot.into().trim_end_matches('/').to_string();
        Self { client, wwwroot }
    }

    /// The no-login ajax endpoint. Responses are cacheable by `cachekey`.
    pub fn endpoint(&self) -> String {
        format!("{}/lib/ajax/service-nologin.php", self.wwwroot)
    }

    async fn call(
        client: reqwest::Client,
        endpoint: String,
        request: MapRequest,
    ) -> Result<Vec<IconMapRecord>> {
        let args = json!([{
            "index": 0,
            "methodname": SERVICE_NAME,
            "args": { "themename": request.theme_name },
        }]);

        log::debug!(
            "Fetching icon map for theme '{}' (rev {})",
            request.theme_name,
            request.cache_key
        );

        let body: Value = client
            .get(&endpoint)
            .query(&[
                ("info", SERVICE_NAME.to_string()),
                ("cachekey", request.cache_key.to_string()),
                ("args", args.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_service_body(body)
    }
}

impl MapFetcher for HttpMapFetcher {
    fn fetch_map(&self, request: &MapRequest) -> BoxFuture<'static, Result<Vec<IconMapRecord>>> {
        Self::call(self.client.clone(), self.endpoint(), request.clone()).boxed()
    }
}

/// Unpack the ajax envelope: either a top level exception object or an array
/// with one response per requested call.
fn parse_service_body(body: Value) -> Result<Vec<IconMapRecord>> {
    if body.is_object() {
        let exception: ServiceException = serde_json::from_value(body)?;
        return Err(IconMapError::Remote {
            errorcode: exception.errorcode,
            message: exception.message,
        });
    }

    let mut responses: Vec<ServiceResponse> = serde_json::from_value(body)?;
    if responses.is_empty() {
        return Err(IconMapError::Deserialization(
            "empty service response".to_string(),
        ));
    }
    let response = responses.swap_remove(0);

    if response.error {
        let exception = response.exception.unwrap_or(ServiceException {
            message: "unknown error".to_string(),
            errorcode: String::new(),
        });
        return Err(IconMapError::Remote {
            errorcode: exception.errorcode,
            message: exception.message,
        });
    }

    let data = response.data.unwrap_or(Value::Array(Vec::new()));
    Ok(serde_json::from_value(data)?)
}
