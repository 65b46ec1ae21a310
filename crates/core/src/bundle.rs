use crate::config::Settings;
use crate::error::AnalysisError;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resolves opaque bundle references to their JSON content. A failed fetch is
/// surfaced verbatim as `AnalysisError::DataFetch`; there is no retry and no
/// partial result.
#[async_trait::async_trait]
pub trait BundleStore: Send + Sync {
    async fn fetch_bundle(&self, reference: &str) -> Result<Value>;

    /// Resolves every reference in order, failing the whole request on the
    /// first error. Analysis never proceeds on partial data.
    async fn fetch_all(&self, references: &[String]) -> Result<Vec<Value>> {
        let mut bundles = Vec::with_capacity(references.len());
        for reference in references {
            bundles.push(self.fetch_bundle(reference).await?);
        }
        Ok(bundles)
    }
}

#[derive(Debug, Clone)]
pub struct HttpJsonBundleStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpJsonBundleStore {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_bundle_base_url()?.to_string();
        let api_key = settings.bundle_api_key.clone();

        let timeout_secs = std::env::var("BUNDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build bundle store http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Absolute references pass through; everything else is joined onto the
    /// configured base URL.
    fn url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return reference.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            reference.trim_start_matches('/')
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl BundleStore for HttpJsonBundleStore {
    async fn fetch_bundle(&self, reference: &str) -> Result<Value> {
        let url = self.url(reference);
        let headers = self.headers()?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| AnalysisError::DataFetch {
                reference: reference.to_string(),
                detail: e.to_string(),
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|e| AnalysisError::DataFetch {
            reference: reference.to_string(),
            detail: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(AnalysisError::DataFetch {
                reference: reference.to_string(),
                detail: format!("HTTP {status}"),
            }
            .into());
        }

        serde_json::from_str::<Value>(&text)
            .map_err(|e| {
                AnalysisError::DataFetch {
                    reference: reference.to_string(),
                    detail: format!("response is not valid JSON: {e}"),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> HttpJsonBundleStore {
        HttpJsonBundleStore {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: None,
        }
    }

    #[test]
    fn joins_relative_references_onto_the_base_url() {
        let s = store("https://bundles.example.com/v1/");
        assert_eq!(
            s.url("stocks/AAPL.json"),
            "https://bundles.example.com/v1/stocks/AAPL.json"
        );
        assert_eq!(
            s.url("/stocks/AAPL.json"),
            "https://bundles.example.com/v1/stocks/AAPL.json"
        );
    }

    #[test]
    fn absolute_references_pass_through() {
        let s = store("https://bundles.example.com");
        assert_eq!(
            s.url("https://elsewhere.example.com/b.json"),
            "https://elsewhere.example.com/b.json"
        );
    }
}
