use crate::config::Settings;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Thin client over the payment provider's REST API: customers, checkout
/// sessions, subscription lookup. Everything else stays on the provider side.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionInfo {
    #[serde(rename = "customer")]
    pub customer_id: String,
    pub status: String,
}

impl StripeClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let secret_key = settings.require_stripe_secret_key()?.to_string();
        let base_url =
            std::env::var("STRIPE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Stripe http client")?;

        Ok(Self {
            http,
            secret_key,
            base_url,
        })
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await
            .context("Stripe request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read Stripe response")?;
        if !status.is_success() {
            anyhow::bail!("Stripe HTTP {status}: {text}");
        }
        serde_json::from_str(&text)
            .with_context(|| format!("Stripe response is not valid JSON: {text}"))
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let res = self
            .http
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("Stripe request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read Stripe response")?;
        if !status.is_success() {
            anyhow::bail!("Stripe HTTP {status}: {text}");
        }
        serde_json::from_str(&text)
            .with_context(|| format!("Stripe response is not valid JSON: {text}"))
    }

    pub async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Result<String> {
        let mut params = vec![("metadata[app_user_id]", user_id.to_string())];
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }

        let customer = self.post_form("/v1/customers", &params).await?;
        customer["id"]
            .as_str()
            .map(str::to_string)
            .context("Stripe customer response missing id")
    }

    pub async fn create_subscription_checkout(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String> {
        let params = vec![
            ("mode", "subscription".to_string()),
            ("customer", customer_id.to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
        ];

        let session = self.post_form("/v1/checkout/sessions", &params).await?;
        session["id"]
            .as_str()
            .map(str::to_string)
            .context("Stripe checkout session response missing id")
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo> {
        let subscription = self
            .get_json(&format!("/v1/subscriptions/{subscription_id}"))
            .await?;
        serde_json::from_value(subscription).context("failed to decode Stripe subscription")
    }
}
