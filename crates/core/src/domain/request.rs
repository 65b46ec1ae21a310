use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Upper bound on data bundles in a single request. Larger requests are
/// rejected before any routing happens.
pub const MAX_BUNDLE_REFS: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Opaque references to per-company JSON data bundles.
    #[serde(default)]
    pub bundle_refs: Vec<String>,
    /// When present, sector analysis wins over every bundle-count rule.
    #[serde(default)]
    pub sector: Option<String>,
    /// Display hint only; never participates in mode selection.
    #[serde(default)]
    pub ticker: Option<String>,
    /// Display hint only; never participates in mode selection.
    #[serde(default)]
    pub company_name: Option<String>,
}

/// The five recommendation strategies. Every request maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    SectorOrIndustry,
    AiTopPickSingle,
    SingleStock,
    CompareTwoStocks,
    MultiStockTopPick,
}

/// One turn of a follow-up conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl AnalysisRequest {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.bundle_refs.len() <= MAX_BUNDLE_REFS,
            "at most {MAX_BUNDLE_REFS} bundle refs are supported (got {})",
            self.bundle_refs.len()
        );
        ensure!(
            self.bundle_refs.iter().all(|r| !r.trim().is_empty()),
            "bundle refs must be non-empty"
        );
        Ok(())
    }

    fn sector_trimmed(&self) -> Option<&str> {
        self.sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Fixed priority, first match wins: sector, then bundle count 0/1/2/many.
    pub fn mode(&self) -> AnalysisMode {
        if self.sector_trimmed().is_some() {
            return AnalysisMode::SectorOrIndustry;
        }
        match self.bundle_refs.len() {
            0 => AnalysisMode::AiTopPickSingle,
            1 => AnalysisMode::SingleStock,
            2 => AnalysisMode::CompareTwoStocks,
            _ => AnalysisMode::MultiStockTopPick,
        }
    }
}
