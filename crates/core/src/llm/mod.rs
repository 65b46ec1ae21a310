use crate::domain::recommendation::RecommendationResult;

pub mod anthropic;
pub mod error;
pub mod json;

#[derive(Debug, Clone, Copy)]
pub enum Provider {
    Anthropic,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Structured recommendation per the shared output contract. Contract
    /// violations surface as `AnalysisError::OutputValidation`; they are not
    /// retried.
    async fn generate_recommendation(&self, prompt: &str)
        -> anyhow::Result<RecommendationResult>;

    /// Plain-text completion for follow-up answers and feedback summaries.
    async fn complete_text(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}
