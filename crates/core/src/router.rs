use crate::bundle::BundleStore;
use crate::domain::recommendation::RecommendationResult;
use crate::domain::request::{AnalysisMode, AnalysisRequest};
use crate::domain::score::{self, CandidateBundle};
use crate::llm::LlmClient;
use crate::prompt::{
    CompareTwoPrompt, MultiTopPickPrompt, PromptLibrary, SectorPrompt, SingleStockPrompt,
};
use anyhow::Context;
use std::sync::Arc;

/// Classifies a request into its analysis mode, resolves whatever data the
/// mode needs, assembles the mode's prompt, and runs the model. The usage
/// gate has already passed by the time a request reaches this.
pub struct RequestRouter {
    prompts: Arc<PromptLibrary>,
    bundles: Arc<dyn BundleStore>,
    llm: Arc<dyn LlmClient>,
}

impl RequestRouter {
    pub fn new(
        prompts: Arc<PromptLibrary>,
        bundles: Arc<dyn BundleStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            prompts,
            bundles,
            llm,
        }
    }

    pub async fn handle(&self, request: &AnalysisRequest) -> anyhow::Result<RecommendationResult> {
        request.validate()?;
        let mode = request.mode();
        tracing::info!(
            ?mode,
            template = PromptLibrary::template_for(mode),
            bundle_refs = request.bundle_refs.len(),
            "dispatching analysis request"
        );

        let prompt = self.assemble_prompt(mode, request).await?;
        self.llm.generate_recommendation(&prompt).await
    }

    async fn assemble_prompt(
        &self,
        mode: AnalysisMode,
        request: &AnalysisRequest,
    ) -> anyhow::Result<String> {
        match mode {
            AnalysisMode::SectorOrIndustry => {
                let sector = request.sector.as_deref().map(str::trim).unwrap_or_default();
                self.prompts.sector(&SectorPrompt { sector })
            }
            AnalysisMode::AiTopPickSingle => self.prompts.ai_top_pick(),
            AnalysisMode::SingleStock => {
                let bundles = self.bundles.fetch_all(&request.bundle_refs).await?;
                let [bundle] = bundles.as_slice() else {
                    anyhow::bail!("single-stock mode expects exactly one bundle");
                };
                let bundle_json =
                    serde_json::to_string(bundle).context("failed to serialize bundle")?;
                self.prompts.single_stock(&SingleStockPrompt {
                    ticker: request.ticker.as_deref().unwrap_or("the selected ticker"),
                    company_name: request
                        .company_name
                        .as_deref()
                        .unwrap_or("the selected company"),
                    bundle_json: &bundle_json,
                })
            }
            AnalysisMode::CompareTwoStocks => {
                let bundles = self.bundles.fetch_all(&request.bundle_refs).await?;
                let [first, second] = bundles.as_slice() else {
                    anyhow::bail!("compare mode expects exactly two bundles");
                };
                let first_bundle_json =
                    serde_json::to_string(first).context("failed to serialize bundle")?;
                let second_bundle_json =
                    serde_json::to_string(second).context("failed to serialize bundle")?;
                self.prompts.compare_two(&CompareTwoPrompt {
                    first_bundle_json: &first_bundle_json,
                    second_bundle_json: &second_bundle_json,
                })
            }
            AnalysisMode::MultiStockTopPick => {
                let bundles = self.bundles.fetch_all(&request.bundle_refs).await?;
                let candidates: Vec<CandidateBundle> =
                    bundles.iter().map(CandidateBundle::from_json).collect();
                let ranking = score::rank_candidates(&candidates);
                let ranking_json = serde_json::to_string_pretty(&ranking)
                    .context("failed to serialize ranking")?;
                let bundles_json =
                    serde_json::to_string(&bundles).context("failed to serialize bundles")?;
                self.prompts.multi_top_pick(&MultiTopPickPrompt {
                    candidate_count: ranking.len(),
                    ranking_json: &ranking_json,
                    bundles_json: &bundles_json,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::llm::Provider;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticBundles(HashMap<String, Value>);

    #[async_trait::async_trait]
    impl BundleStore for StaticBundles {
        async fn fetch_bundle(&self, reference: &str) -> anyhow::Result<Value> {
            self.0.get(reference).cloned().ok_or_else(|| {
                AnalysisError::DataFetch {
                    reference: reference.to_string(),
                    detail: "not found".to_string(),
                }
                .into()
            })
        }
    }

    struct CapturingLlm {
        prompts_seen: Mutex<Vec<String>>,
    }

    impl CapturingLlm {
        fn new() -> Self {
            Self {
                prompts_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for CapturingLlm {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        async fn generate_recommendation(
            &self,
            prompt: &str,
        ) -> anyhow::Result<RecommendationResult> {
            self.prompts_seen.lock().unwrap().push(prompt.to_string());
            Ok(RecommendationResult {
                recommendation: "BUY - test thesis.".to_string(),
                reasoning: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                sections_overview: None,
            })
        }

        async fn complete_text(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            Ok("answer".to_string())
        }
    }

    fn router_with(
        bundles: HashMap<String, Value>,
    ) -> (RequestRouter, Arc<CapturingLlm>) {
        let llm = Arc::new(CapturingLlm::new());
        let router = RequestRouter::new(
            Arc::new(PromptLibrary::new().unwrap()),
            Arc::new(StaticBundles(bundles)),
            llm.clone(),
        );
        (router, llm)
    }

    fn request(bundle_refs: &[&str], sector: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            bundle_refs: bundle_refs.iter().map(|s| s.to_string()).collect(),
            sector: sector.map(|s| s.to_string()),
            ticker: None,
            company_name: None,
        }
    }

    #[tokio::test]
    async fn sector_wins_over_bundles_and_never_fetches() {
        // The store errors on any fetch, so this passes only if sector mode
        // takes precedence and skips bundle resolution entirely.
        let (router, llm) = router_with(HashMap::new());
        let req = request(&["missing.json"], Some("utilities"));

        router.handle(&req).await.unwrap();
        let prompts = llm.prompts_seen.lock().unwrap();
        assert!(prompts[0].contains("Sector/Industry: utilities"));
    }

    #[tokio::test]
    async fn single_stock_mode_embeds_the_fetched_bundle() {
        let (router, llm) = router_with(HashMap::from([(
            "bundles/AAPL.json".to_string(),
            json!({"ticker": "AAPL", "ratios": {"pe": 29.4}}),
        )]));
        let mut req = request(&["bundles/AAPL.json"], None);
        req.ticker = Some("AAPL".to_string());
        req.company_name = Some("Apple Inc.".to_string());

        router.handle(&req).await.unwrap();
        let prompts = llm.prompts_seen.lock().unwrap();
        assert!(prompts[0].contains("AAPL - Apple Inc."));
        assert!(prompts[0].contains(r#""pe":29.4"#));
    }

    #[tokio::test]
    async fn any_failed_fetch_fails_the_whole_request() {
        let (router, llm) = router_with(HashMap::from([(
            "ok.json".to_string(),
            json!({"ticker": "OK"}),
        )]));
        let req = request(&["ok.json", "missing.json"], None);

        let err = router.handle(&req).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::DataFetch { .. })
        ));
        // The model must not run on partial data.
        assert!(llm.prompts_seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_mode_embeds_the_precomputed_ranking() {
        let strong = json!({
            "ticker": "STRONG",
            "financial_statements": {"quarters": [
                {"revenue": 100.0}, {"revenue": 100.0}, {"revenue": 100.0},
                {"revenue": 100.0}, {"revenue": 130.0}
            ]},
            "ratios": {"pe": 12.0, "debt_to_equity": 0.4}
        });
        let weak = json!({
            "ticker": "WEAK",
            "financial_statements": {"quarters": [
                {"revenue": 100.0}, {"revenue": 100.0}, {"revenue": 100.0},
                {"revenue": 100.0}, {"revenue": 90.0}
            ]},
            "ratios": {"pe": 40.0, "debt_to_equity": 3.0}
        });
        let (router, llm) = router_with(HashMap::from([
            ("strong.json".to_string(), strong),
            ("weak.json".to_string(), weak),
            ("flat.json".to_string(), json!({"ticker": "FLAT"})),
        ]));
        let req = request(&["weak.json", "flat.json", "strong.json"], None);

        router.handle(&req).await.unwrap();
        let prompts = llm.prompts_seen.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("among 3 candidate companies"));
        // Winner first in the serialized ranking.
        let strong_at = prompt.find("\"ticker\": \"STRONG\"").unwrap();
        let weak_at = prompt.find("\"ticker\": \"WEAK\"").unwrap();
        assert!(strong_at < weak_at);
    }

    #[tokio::test]
    async fn out_of_domain_requests_are_rejected_before_fetching() {
        let (router, llm) = router_with(HashMap::new());
        let refs: Vec<&str> = (0..11).map(|_| "r.json").collect();
        let req = request(&refs, None);

        assert!(router.handle(&req).await.is_err());
        assert!(llm.prompts_seen.lock().unwrap().is_empty());
    }
}
