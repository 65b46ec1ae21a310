use serde::{Deserialize, Serialize};

/// The structured output every analysis mode must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    /// BUY / HOLD / SELL plus a one-sentence summary.
    pub recommendation: String,
    /// 3-5 supporting bullet points.
    pub reasoning: Vec<String>,
    /// One-line overviews of the analysis sections, in the richer variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections_overview: Option<Vec<String>>,
}
