use crate::domain::contract::LlmRecommendation;
use crate::domain::recommendation::RecommendationResult;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_recommendation(text: &str) -> anyhow::Result<RecommendationResult> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmRecommendation>(&json_str).with_context(|| {
        format!("LLM output is not valid JSON for the recommendation schema: {json_str}")
    })?;
    parsed.validate_and_into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_recommendation_json() -> String {
        json!({
            "recommendation": "BUY - revenue up 12% with margins expanding.",
            "reasoning": [
                "Revenue increased 12% year-over-year.",
                "Operating margin expanded from 18% to 22%.",
                "Trading below its 50-day moving average with RSI at 44."
            ],
        })
        .to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_recommendation_accepts_valid_json() {
        let result = parse_recommendation(&valid_recommendation_json()).unwrap();
        assert!(result.recommendation.starts_with("BUY"));
        assert_eq!(result.reasoning.len(), 3);
    }

    #[test]
    fn parse_recommendation_accepts_prose_wrapped_json() {
        let wrapped = format!("Here is my analysis:\n{}\nHope that helps!", valid_recommendation_json());
        let result = parse_recommendation(&wrapped).unwrap();
        assert_eq!(result.reasoning.len(), 3);
    }

    #[test]
    fn parse_recommendation_rejects_wrong_bullet_count() {
        let json = json!({
            "recommendation": "HOLD - fairly valued.",
            "reasoning": ["only one bullet"],
        })
        .to_string();
        assert!(parse_recommendation(&json).is_err());
    }

    #[test]
    fn parse_recommendation_rejects_non_json() {
        assert!(parse_recommendation("I would buy this stock.").is_err());
    }
}
