use crate::domain::request::{AnalysisMode, ChatMessage};
use anyhow::Context;
use handlebars::Handlebars;
use serde::Serialize;

mod templates;

const TPL_SECTOR: &str = "sector_or_industry";
const TPL_AI_TOP_PICK: &str = "ai_top_pick_single";
const TPL_SINGLE_STOCK: &str = "single_stock";
const TPL_COMPARE_TWO: &str = "compare_two_stocks";
const TPL_MULTI_TOP_PICK: &str = "multi_stock_top_pick";
const TPL_FOLLOW_UP: &str = "follow_up";
const TPL_FEEDBACK_SUMMARY: &str = "feedback_summary";

#[derive(Debug, Serialize)]
pub struct SectorPrompt<'a> {
    pub sector: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SingleStockPrompt<'a> {
    pub ticker: &'a str,
    pub company_name: &'a str,
    pub bundle_json: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CompareTwoPrompt<'a> {
    pub first_bundle_json: &'a str,
    pub second_bundle_json: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MultiTopPickPrompt<'a> {
    pub candidate_count: usize,
    pub ranking_json: &'a str,
    pub bundles_json: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FollowUpPrompt<'a> {
    pub question: &'a str,
    pub ticker1: &'a str,
    pub ticker2: Option<&'a str>,
    pub initial_recommendation: &'a str,
    pub chat_history: &'a [ChatMessage],
}

#[derive(Debug, Serialize)]
pub struct FeedbackSummaryPrompt<'a> {
    pub feedback: &'a str,
}

/// All prompt templates, registered once at startup. Strict mode turns any
/// unresolved placeholder into a render error instead of leaked template
/// text; escaping is disabled because the output is a prompt, not HTML.
pub struct PromptLibrary {
    registry: Handlebars<'static>,
}

impl PromptLibrary {
    pub fn new() -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        for (name, body) in [
            (TPL_SECTOR, templates::SECTOR_OR_INDUSTRY),
            (TPL_AI_TOP_PICK, templates::AI_TOP_PICK_SINGLE),
            (TPL_SINGLE_STOCK, templates::SINGLE_STOCK),
            (TPL_COMPARE_TWO, templates::COMPARE_TWO_STOCKS),
            (TPL_MULTI_TOP_PICK, templates::MULTI_STOCK_TOP_PICK),
            (TPL_FOLLOW_UP, templates::FOLLOW_UP),
            (TPL_FEEDBACK_SUMMARY, templates::FEEDBACK_SUMMARY),
        ] {
            registry
                .register_template_string(name, body)
                .with_context(|| format!("failed to register template {name}"))?;
        }

        Ok(Self { registry })
    }

    fn render(&self, name: &str, data: &impl Serialize) -> anyhow::Result<String> {
        self.registry
            .render(name, data)
            .with_context(|| format!("failed to render template {name}"))
    }

    pub fn sector(&self, prompt: &SectorPrompt<'_>) -> anyhow::Result<String> {
        self.render(TPL_SECTOR, prompt)
    }

    pub fn ai_top_pick(&self) -> anyhow::Result<String> {
        self.render(TPL_AI_TOP_PICK, &serde_json::json!({}))
    }

    pub fn single_stock(&self, prompt: &SingleStockPrompt<'_>) -> anyhow::Result<String> {
        self.render(TPL_SINGLE_STOCK, prompt)
    }

    pub fn compare_two(&self, prompt: &CompareTwoPrompt<'_>) -> anyhow::Result<String> {
        self.render(TPL_COMPARE_TWO, prompt)
    }

    pub fn multi_top_pick(&self, prompt: &MultiTopPickPrompt<'_>) -> anyhow::Result<String> {
        self.render(TPL_MULTI_TOP_PICK, prompt)
    }

    pub fn follow_up(&self, prompt: &FollowUpPrompt<'_>) -> anyhow::Result<String> {
        self.render(TPL_FOLLOW_UP, prompt)
    }

    pub fn feedback_summary(&self, prompt: &FeedbackSummaryPrompt<'_>) -> anyhow::Result<String> {
        self.render(TPL_FEEDBACK_SUMMARY, prompt)
    }

    /// Template name backing a mode, for logging.
    pub fn template_for(mode: AnalysisMode) -> &'static str {
        match mode {
            AnalysisMode::SectorOrIndustry => TPL_SECTOR,
            AnalysisMode::AiTopPickSingle => TPL_AI_TOP_PICK,
            AnalysisMode::SingleStock => TPL_SINGLE_STOCK,
            AnalysisMode::CompareTwoStocks => TPL_COMPARE_TWO,
            AnalysisMode::MultiStockTopPick => TPL_MULTI_TOP_PICK,
        }
    }
}
