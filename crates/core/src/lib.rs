pub mod billing;
pub mod bundle;
pub mod domain;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod router;
pub mod storage;
pub mod usage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub stripe_secret_key: Option<String>,
        pub stripe_webhook_secret: Option<String>,
        pub stripe_price_id: Option<String>,
        pub bundle_base_url: Option<String>,
        pub bundle_api_key: Option<String>,
        pub app_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
                stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
                stripe_price_id: std::env::var("STRIPE_PRICE_ID").ok(),
                bundle_base_url: std::env::var("BUNDLE_BASE_URL").ok(),
                bundle_api_key: std::env::var("BUNDLE_API_KEY").ok(),
                app_base_url: std::env::var("APP_BASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_stripe_secret_key(&self) -> anyhow::Result<&str> {
            self.stripe_secret_key
                .as_deref()
                .context("STRIPE_SECRET_KEY is required")
        }

        pub fn require_stripe_webhook_secret(&self) -> anyhow::Result<&str> {
            self.stripe_webhook_secret
                .as_deref()
                .context("STRIPE_WEBHOOK_SECRET is required")
        }

        pub fn require_bundle_base_url(&self) -> anyhow::Result<&str> {
            self.bundle_base_url
                .as_deref()
                .context("BUNDLE_BASE_URL is required")
        }
    }
}
