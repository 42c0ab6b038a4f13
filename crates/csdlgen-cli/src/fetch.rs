//! HTTP fetcher for referenced schemas missing from the schema directory.

use std::time::Duration;

use anyhow::{anyhow, Result};
use csdlgen_edm::{EdmError, Fetcher};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("csdlgen/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow!("failed to build http client: {e}"))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    /// Single attempt; any transport error or non-success status fails the
    /// whole run.
    fn fetch(&self, uri: &str) -> csdlgen_edm::Result<Vec<u8>> {
        let failed = |message: String| EdmError::Fetch {
            uri: uri.to_string(),
            message,
        };
        let url = Url::parse(uri).map_err(|e| failed(format!("invalid url: {e}")))?;
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(failed(format!("http status {}", resp.status())));
        }
        let bytes = resp.bytes().map_err(|e| failed(e.to_string()))?;
        tracing::debug!(uri, bytes = bytes.len(), "fetched schema");
        Ok(bytes.to_vec())
    }
}
