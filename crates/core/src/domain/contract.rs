use crate::domain::recommendation::RecommendationResult;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

pub const MIN_REASONING_BULLETS: usize = 3;
pub const MAX_REASONING_BULLETS: usize = 5;

/// Loose mirror of [`RecommendationResult`] as the model emits it. Everything
/// the model sends is treated as untrusted until it passes
/// [`validate_and_into_result`](Self::validate_and_into_result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRecommendation {
    pub recommendation: String,
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub sections_overview: Option<Vec<String>>,
}

impl LlmRecommendation {
    pub fn validate_and_into_result(self) -> anyhow::Result<RecommendationResult> {
        let recommendation = self.recommendation.trim().to_string();
        ensure!(!recommendation.is_empty(), "recommendation must be non-empty");

        ensure!(
            (MIN_REASONING_BULLETS..=MAX_REASONING_BULLETS).contains(&self.reasoning.len()),
            "reasoning must have {MIN_REASONING_BULLETS} to {MAX_REASONING_BULLETS} bullets (got {})",
            self.reasoning.len()
        );

        let mut reasoning = Vec::with_capacity(self.reasoning.len());
        for bullet in self.reasoning {
            let bullet = bullet.trim().to_string();
            ensure!(!bullet.is_empty(), "reasoning bullets must be non-empty");
            reasoning.push(bullet);
        }

        let sections_overview = self
            .sections_overview
            .map(|sections| {
                sections
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|sections| !sections.is_empty());

        Ok(RecommendationResult {
            recommendation,
            reasoning,
            sections_overview,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> LlmRecommendation {
        LlmRecommendation {
            recommendation: "BUY - margins widening while the stock trades at a discount."
                .to_string(),
            reasoning: vec![
                "Revenue grew 12% year-over-year.".to_string(),
                "Operating margin expanded from 18% to 22%.".to_string(),
                "RSI of 41 leaves room before overbought territory.".to_string(),
            ],
            sections_overview: None,
        }
    }

    #[test]
    fn accepts_three_to_five_bullets() {
        for n in MIN_REASONING_BULLETS..=MAX_REASONING_BULLETS {
            let mut rec = valid();
            rec.reasoning = (0..n).map(|i| format!("point {i}")).collect();
            assert!(rec.validate_and_into_result().is_ok(), "n={n}");
        }
    }

    #[test]
    fn rejects_empty_recommendation() {
        let mut rec = valid();
        rec.recommendation = "   ".to_string();
        assert!(rec.validate_and_into_result().is_err());
    }

    #[test]
    fn rejects_too_few_or_too_many_bullets() {
        let mut rec = valid();
        rec.reasoning = vec!["one".to_string(), "two".to_string()];
        assert!(rec.validate_and_into_result().is_err());

        let mut rec = valid();
        rec.reasoning = (0..6).map(|i| format!("point {i}")).collect();
        assert!(rec.validate_and_into_result().is_err());
    }

    #[test]
    fn rejects_blank_bullet() {
        let mut rec = valid();
        rec.reasoning[1] = "  ".to_string();
        assert!(rec.validate_and_into_result().is_err());
    }

    #[test]
    fn drops_empty_sections_overview() {
        let mut rec = valid();
        rec.sections_overview = Some(vec!["  ".to_string()]);
        let result = rec.validate_and_into_result().unwrap();
        assert!(result.sections_overview.is_none());
    }

    #[test]
    fn trims_and_keeps_sections_overview() {
        let mut rec = valid();
        rec.sections_overview = Some(vec![" Earnings: solid quarter ".to_string()]);
        let result = rec.validate_and_into_result().unwrap();
        assert_eq!(
            result.sections_overview.as_deref(),
            Some(&["Earnings: solid quarter".to_string()][..])
        );
    }
}
