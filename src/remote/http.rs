//! HTTP client for the cache node.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, Url};

use crate::error::StoreError;
use crate::models::{DeleteResponse, SetResponse};
use crate::remote::{RemoteStore, SetCondition};

// == Http Remote ==
/// [`RemoteStore`] backed by a cache node's `/keys` API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
}

impl HttpRemote {
    /// Creates a client for the node at `base_url`, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a client reusing an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url).map_err(|err| StoreError::InvalidEndpoint(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidEndpoint(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL for `key`, percent-encoded as a single path segment.
    fn key_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .push("keys")
            .push(key);
        Ok(url)
    }
}

/// Whole milliseconds for the `ttl_ms` query, rounded up so that a sub-ms
/// TTL does not turn into 0, which the node reads as "no expiry".
fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_millis() + u128::from(ttl.subsec_nanos() % 1_000_000 != 0);
    millis.min(u128::from(u64::MAX)) as u64
}

/// Turns a non-success response into a `StoreError::Status`.
async fn unexpected(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StoreError::Status { status, message }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let response = self.client.get(self.key_url(key)?).send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.bytes().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(response).await),
        }
    }

    async fn set(
        &self,
        key: &str,
        payload: Bytes,
        ttl: Duration,
        condition: SetCondition,
    ) -> Result<bool, StoreError> {
        let ttl_ms = ttl_millis(ttl);
        let response = self
            .client
            .put(self.key_url(key)?)
            .query(&[("ttl_ms", ttl_ms.to_string()), ("condition", condition.as_str().to_string())])
            .body(payload)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        Ok(response.json::<SetResponse>().await?.stored)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let response = self.client.delete(self.key_url(key)?).send().await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        Ok(response.json::<DeleteResponse>().await?.deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let response = self.client.head(self.key_url(key)?).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_url_encodes_segment() {
        let remote = HttpRemote::new("http://127.0.0.1:3000").unwrap();
        let url = remote.key_url("user:42/profile").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/keys/user:42%2Fprofile");
    }

    #[test]
    fn test_key_url_keeps_base_path() {
        let remote = HttpRemote::new("http://cache.internal/node-a/").unwrap();
        let url = remote.key_url("k").unwrap();
        assert_eq!(url.as_str(), "http://cache.internal/node-a/keys/k");
    }

    #[test]
    fn test_ttl_millis_rounds_up() {
        assert_eq!(ttl_millis(Duration::ZERO), 0);
        assert_eq!(ttl_millis(Duration::from_nanos(1)), 1);
        assert_eq!(ttl_millis(Duration::from_micros(500)), 1);
        assert_eq!(ttl_millis(Duration::from_millis(250)), 250);
        assert_eq!(ttl_millis(Duration::from_micros(1_500)), 2);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpRemote::new("not a url"),
            Err(StoreError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            HttpRemote::new("mailto:ops@example.com"),
            Err(StoreError::InvalidEndpoint(_))
        ));
    }
}
