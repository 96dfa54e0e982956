//! Shared outbound HTTP helpers used by every node that forwards a chunk or
//! proxies a reassembled request to the next hop.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Build a client with a fixed request timeout. Each node owns one of these
/// rather than constructing a client per call.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("failed to build http client")
}

/// POST `body` as JSON to `url` and deserialize the JSON response.
pub async fn post_json<T: Serialize, R: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
) -> Result<R> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {url} failed"))?
        .error_for_status()
        .with_context(|| format!("POST {url} returned an error status"))?;
    response
        .json::<R>()
        .await
        .with_context(|| format!("failed to parse JSON response from {url}"))
}

/// POST `body` as JSON to `url`, discarding the response body beyond its
/// status. Used for fire-and-forget chunk forwarding.
pub async fn post_json_ok<T: Serialize>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
) -> Result<()> {
    client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {url} failed"))?
        .error_for_status()
        .with_context(|| format!("POST {url} returned an error status"))?;
    Ok(())
}
