use serde::Serialize;

/// Hard failures that abort a request. None of these are retried; the caller
/// sees them verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to fetch data bundle {reference}: {detail}")]
    DataFetch { reference: String, detail: String },

    #[error("model output failed the recommendation contract: {0}")]
    OutputValidation(String),

    #[error("missing required configuration: {0}")]
    Configuration(&'static str),

    #[error("webhook signature verification failed")]
    WebhookVerification,
}

/// What the caller must provide to get past a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Required {
    Subscription,
    Auth,
}

/// A typed refusal. Not an error: the caller is expected to present a paywall
/// or a sign-in prompt and try again.
#[derive(Debug, Clone, Serialize)]
pub struct Refusal {
    pub error: String,
    pub required: Required,
}

impl Refusal {
    pub fn subscription() -> Self {
        Self {
            error: "Usage limit reached".to_string(),
            required: Required::Subscription,
        }
    }

    pub fn auth() -> Self {
        Self {
            error: "Authentication required".to_string(),
            required: Required::Auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_serialize_with_lowercase_required() {
        let v = serde_json::to_value(Refusal::subscription()).unwrap();
        assert_eq!(v["required"], "subscription");
        let v = serde_json::to_value(Refusal::auth()).unwrap();
        assert_eq!(v["required"], "auth");
        assert!(v["error"].as_str().is_some_and(|s| !s.is_empty()));
    }
}
