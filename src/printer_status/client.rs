//! PrusaLink HTTP status source

use super::types::{PrinterStatusSnapshot, PrusaLinkStatus};
use super::PrinterStatusSource;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

const STATUS_PATH: &str = "/api/v1/status";
const API_KEY_HEADER: &str = "X-Api-Key";

/// PrusaLink client
pub struct PrusaLinkClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PrusaLinkClient {
    /// Create new client (10s request timeout)
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(10))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn status_url(&self) -> String {
        format!("{}{}", self.base_url, STATUS_PATH)
    }
}

#[async_trait]
impl PrinterStatusSource for PrusaLinkClient {
    async fn fetch(&self) -> Result<PrinterStatusSnapshot> {
        let mut req = self.client.get(self.status_url());
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(Error::Internal(format!(
                "PrusaLink status failed: {}",
                resp.status()
            )));
        }

        let status: PrusaLinkStatus = resp.json().await?;
        Ok(status.into())
    }
}
