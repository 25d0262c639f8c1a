//! Minimal HTTP plumbing used to pull the stop catalog from a remote service.

mod auth;
mod basic;
mod client;

pub use auth::ApiKey;
pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        bail!("GET {url} returned {}", resp.status());
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Fetches `url` and decodes the body as JSON.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(client: &C, url: &str) -> Result<T> {
    let bytes = fetch_bytes(client, url).await?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid JSON from {url}"))
}
