use crate::config::Settings;
use crate::domain::contract::{LlmRecommendation, MAX_REASONING_BULLETS, MIN_REASONING_BULLETS};
use crate::domain::recommendation::RecommendationResult;
use crate::error::AnalysisError;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{json, LlmClient, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOOL_NAME_EMIT_RECOMMENDATION: &str = "emit_recommendation";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> anyhow::Result<(serde_json::Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn tools() -> Vec<Tool> {
        // JSON schema for the shared output contract. Strict and explicit to
        // maximize compliance.
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["recommendation", "reasoning"],
            "properties": {
                "recommendation": {
                    "type": "string",
                    "description": "BUY, HOLD, or SELL plus a one-sentence summary"
                },
                "reasoning": {
                    "type": "array",
                    "minItems": MIN_REASONING_BULLETS,
                    "maxItems": MAX_REASONING_BULLETS,
                    "items": {"type": "string"}
                },
                "sections_overview": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_RECOMMENDATION,
            description: "Emit the final recommendation as structured JSON",
            input_schema: schema,
        }]
    }

    fn tool_choice() -> ToolChoice {
        ToolChoice::Tool {
            name: TOOL_NAME_EMIT_RECOMMENDATION,
        }
    }

    fn system_prompt() -> String {
        [
            "You are ProfitScout, a stock recommendation engine.",
            "Return ONLY valid JSON matching the output schema. Do not wrap in markdown.",
            "No trailing commas. No comments. Use double quotes for all JSON strings.",
            "Output schema:",
            "{",
            "  \"recommendation\": \"BUY - one-sentence summary of the thesis\",",
            "  \"reasoning\": [\"bullet 1\", \"bullet 2\", \"bullet 3\"],",
            "  \"sections_overview\": [\"optional one-line section overviews\"]",
            "}",
            "Rules:",
            "- recommendation must start with BUY, HOLD, or SELL",
            "- reasoning must have 3 to 5 bullets, each a specific data-backed insight",
            "- sections_overview is optional; omit it rather than sending an empty array",
        ]
        .join("\n")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            match block {
                ContentBlock::Text { text } => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
                ContentBlock::ToolUse { .. } => {
                    // Callers that enabled tools read `response_tool_recommendation`.
                    continue;
                }
                ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {
                    // Ignore.
                }
                ContentBlock::Unknown => {
                    // Ignore unknown blocks.
                }
            }
        }
        out
    }

    fn response_tool_recommendation(
        res: &CreateMessageResponse,
    ) -> anyhow::Result<Option<LlmRecommendation>> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input, .. } = block {
                if name == TOOL_NAME_EMIT_RECOMMENDATION {
                    let parsed = serde_json::from_value::<LlmRecommendation>(input.clone())
                        .context("failed to decode tool_use.input into LlmRecommendation")?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_recommendation(
        &self,
        prompt: &str,
    ) -> anyhow::Result<RecommendationResult> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(Self::tool_choice()),
        };

        let (_raw_json, res) = self.create_message(req).await?;

        // Tool output path. Contract violations surface immediately; there is
        // no repair round-trip.
        match Self::response_tool_recommendation(&res) {
            Ok(Some(recommendation)) => {
                return recommendation.validate_and_into_result().map_err(|err| {
                    tracing::warn!(error = %err, "model tool output failed the recommendation contract");
                    AnalysisError::OutputValidation(format!("{err:#}")).into()
                });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "model tool output failed to decode");
                return Err(AnalysisError::OutputValidation(format!("{err:#}")).into());
            }
        }

        // Fallback to text (should be rare with a forced tool_choice).
        let text = Self::response_text(&res);
        json::parse_recommendation(&text).map_err(|err| {
            tracing::warn!(error = %err, "model text output failed the recommendation contract");
            AnalysisError::OutputValidation(format!("{err:#}")).into()
        })
    }

    async fn complete_text(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            tools: None,
            tool_choice: None,
        };

        let (raw_json, res) = self.create_message(req).await?;
        let text = Self::response_text(&res);
        if text.trim().is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "text",
                detail: "empty completion".to_string(),
                raw_output: None,
                raw_response_json: Some(raw_json),
            }
            .into());
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: String,
    },

    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        #[serde(default)]
        data: String,
    },

    #[serde(other)]
    Unknown,
}
