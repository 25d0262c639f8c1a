//! Sources the stop registry can be loaded from.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use super::default_stops;
use crate::error::{Error, Result};
use crate::fetch::{ApiKey, BasicClient, HttpClient, fetch_json};
use crate::model::Stop;

/// Abstraction over where the stop list comes from.
#[async_trait]
pub trait StopCatalog: Send + Sync {
    /// Returns every known stop, in registry order.
    async fn list_stops(&self) -> Result<Vec<Stop>>;
}

/// The compiled-in reference stops.
pub struct BuiltinCatalog;

#[async_trait]
impl StopCatalog for BuiltinCatalog {
    async fn list_stops(&self) -> Result<Vec<Stop>> {
        Ok(default_stops())
    }
}

/// Loads stops from a JSON array on disk:
///
/// ```json
/// [
///   { "stopId": "P001", "name": "Terminal Norte", "address": "Av. Principal 123",
///     "latitude": -12.0464, "longitude": -77.0428 }
/// ]
/// ```
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StopCatalog for FileCatalog {
    async fn list_stops(&self) -> Result<Vec<Stop>> {
        debug!(path = %self.path.display(), "Reading stop catalog");
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("cannot read {}", self.path.display()))
            .map_err(catalog_err)?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid stop list in {}", self.path.display()))
            .map_err(catalog_err)
    }
}

/// Fetches stops as a JSON array from a catalog service.
pub struct HttpCatalog<C> {
    client: C,
    url: String,
}

impl<C: HttpClient> HttpCatalog<C> {
    pub fn new(client: C, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> StopCatalog for HttpCatalog<C> {
    async fn list_stops(&self) -> Result<Vec<Stop>> {
        info!(url = %self.url, "Fetching stop catalog");
        fetch_json(&self.client, &self.url)
            .await
            .map_err(catalog_err)
    }
}

/// Picks a catalog for a `--stops` argument: `builtin`, an `http(s)://` URL,
/// or a file path. `token` is sent as a bearer credential to HTTP catalogs.
pub fn catalog_for_source(source: &str, token: Option<&str>) -> Result<Box<dyn StopCatalog>> {
    if source.eq_ignore_ascii_case("builtin") {
        return Ok(Box::new(BuiltinCatalog));
    }

    if source.starts_with("http://") || source.starts_with("https://") {
        return http_catalog(BasicClient::new(), source, token);
    }

    Ok(Box::new(FileCatalog::new(source)))
}

fn http_catalog<C: HttpClient + 'static>(
    client: C,
    url: &str,
    token: Option<&str>,
) -> Result<Box<dyn StopCatalog>> {
    match token {
        Some(token) => {
            let client = ApiKey::bearer(client, token).map_err(catalog_err)?;
            Ok(Box::new(HttpCatalog::new(client, url)))
        }
        None => Ok(Box::new(HttpCatalog::new(client, url))),
    }
}

fn catalog_err(err: anyhow::Error) -> Error {
    Error::Catalog(format!("{err:#}"))
}
