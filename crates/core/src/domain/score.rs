use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical shape of one company data bundle, as far as scoring cares.
/// Unknown keys are ignored; missing sections contribute nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateBundle {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub sec_mda: Option<String>,
    #[serde(default)]
    pub financial_statements: Option<FinancialStatements>,
    #[serde(default)]
    pub ratios: Option<RatioSet>,
    #[serde(default)]
    pub key_metrics: Option<RatioSet>,
    #[serde(default)]
    pub technicals: Vec<TechnicalBar>,
}

/// Quarterly reports, oldest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinancialStatements {
    #[serde(default)]
    pub quarters: Vec<QuarterReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuarterReport {
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub operating_margin: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatioSet {
    #[serde(default, alias = "pe_ratio", alias = "price_earnings_ratio")]
    pub pe: Option<f64>,
    #[serde(default, alias = "debt_equity_ratio")]
    pub debt_to_equity: Option<f64>,
}

/// One indicator sample; the series is oldest first, last entry is current.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TechnicalBar {
    #[serde(default, alias = "SMA_20")]
    pub sma_20: Option<f64>,
    #[serde(default, alias = "SMA_50")]
    pub sma_50: Option<f64>,
    #[serde(default, alias = "RSI_14")]
    pub rsi_14: Option<f64>,
}

/// MD&A phrases that count as a growth driver (+1 each, counted once).
const GROWTH_SIGNALS: &[&str] = &[
    "record revenue",
    "raised guidance",
    "market share gain",
    "new product",
    "backlog growth",
    "capacity expansion",
];

/// MD&A phrases that count as a major risk (-1 each, counted once).
const RISK_SIGNALS: &[&str] = &[
    "tariff",
    "regulatory",
    "regulation",
    "liquidity risk",
    "litigation",
    "impairment",
    "going concern",
    "macro headwind",
];

const PE_PREMIUM: f64 = 25.0;
const PE_DISCOUNT: f64 = 15.0;
const LEVERAGE_CEILING: f64 = 2.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubScores {
    pub earnings: i32,
    pub qualitative: i32,
    pub technical: i32,
    pub valuation: i32,
}

impl SubScores {
    pub fn composite(&self) -> i32 {
        self.earnings + self.qualitative + self.technical + self.valuation
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub ticker: String,
    pub scores: SubScores,
    pub composite: i32,
    pub debt_to_equity: Option<f64>,
    pub revenue_yoy: Option<f64>,
}

impl CandidateBundle {
    /// Bundles are scored best-effort: a malformed bundle scores zero rather
    /// than failing the request, since the fetch already succeeded.
    pub fn from_json(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    fn ratio(&self, pick: impl Fn(&RatioSet) -> Option<f64>) -> Option<f64> {
        self.ratios
            .as_ref()
            .and_then(&pick)
            .or_else(|| self.key_metrics.as_ref().and_then(&pick))
    }

    fn quarters(&self) -> &[QuarterReport] {
        self.financial_statements
            .as_ref()
            .map(|f| f.quarters.as_slice())
            .unwrap_or(&[])
    }

    /// Latest quarter vs the same quarter a year earlier.
    pub fn revenue_yoy(&self) -> Option<f64> {
        let quarters = self.quarters();
        let latest = quarters.last()?.revenue?;
        let year_ago = quarters.len().checked_sub(5).and_then(|i| quarters[i].revenue)?;
        if year_ago == 0.0 {
            return None;
        }
        Some((latest / year_ago - 1.0) * 100.0)
    }

    fn eps_yoy(&self) -> Option<f64> {
        let quarters = self.quarters();
        let latest = quarters.last()?.eps?;
        let year_ago = quarters.len().checked_sub(5).and_then(|i| quarters[i].eps)?;
        Some(latest - year_ago)
    }

    fn qoq_delta(&self, pick: impl Fn(&QuarterReport) -> Option<f64>) -> Option<f64> {
        let quarters = self.quarters();
        let latest = pick(quarters.last()?)?;
        let previous = quarters.len().checked_sub(2).and_then(|i| pick(&quarters[i]))?;
        Some(latest - previous)
    }

    pub fn debt_to_equity(&self) -> Option<f64> {
        self.ratio(|r| r.debt_to_equity)
    }
}

fn sign(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn earnings_score(bundle: &CandidateBundle) -> i32 {
    let mut score = 0;
    if let Some(yoy) = bundle.revenue_yoy() {
        score += sign(yoy);
    }
    if let Some(delta) = bundle.eps_yoy() {
        score += sign(delta);
    }
    if let Some(delta) = bundle.qoq_delta(|q| q.operating_margin) {
        score += sign(delta);
    }
    score
}

fn qualitative_score(bundle: &CandidateBundle) -> i32 {
    let Some(mda) = bundle.sec_mda.as_deref() else {
        return 0;
    };
    let mda = mda.to_lowercase();
    let growth = GROWTH_SIGNALS.iter().filter(|s| mda.contains(**s)).count() as i32;
    let risk = RISK_SIGNALS.iter().filter(|s| mda.contains(**s)).count() as i32;
    growth - risk
}

fn technical_score(bundle: &CandidateBundle) -> i32 {
    let Some(last) = bundle.technicals.last() else {
        return 0;
    };

    let bias = match (last.sma_20, last.sma_50) {
        (Some(fast), Some(slow)) if fast > slow => 1,
        (Some(_), Some(_)) => -1,
        _ => 0,
    };

    let overbought = match last.rsi_14 {
        Some(rsi) if rsi > RSI_OVERBOUGHT => -1,
        Some(rsi) if rsi < RSI_OVERSOLD => 1,
        _ => 0,
    };

    bias + overbought
}

fn valuation_score(bundle: &CandidateBundle) -> i32 {
    let mut score = 0;

    if let Some(pe) = bundle.ratio(|r| r.pe) {
        if pe > PE_PREMIUM {
            score -= 1;
        } else if pe < PE_DISCOUNT {
            score += 1;
        }
    }

    // Quality trend: ROE where reported, operating margin otherwise.
    let quality_delta = bundle
        .qoq_delta(|q| q.roe)
        .or_else(|| bundle.qoq_delta(|q| q.operating_margin));
    if let Some(delta) = quality_delta {
        score += sign(delta);
    }

    if bundle.debt_to_equity().is_some_and(|d| d > LEVERAGE_CEILING) {
        score -= 1;
    }

    score
}

pub fn score_candidate(bundle: &CandidateBundle) -> ScoredCandidate {
    let scores = SubScores {
        earnings: earnings_score(bundle),
        qualitative: qualitative_score(bundle),
        technical: technical_score(bundle),
        valuation: valuation_score(bundle),
    };
    ScoredCandidate {
        ticker: bundle.ticker.clone(),
        composite: scores.composite(),
        scores,
        debt_to_equity: bundle.debt_to_equity(),
        revenue_yoy: bundle.revenue_yoy(),
    }
}

/// Winner first, runner-ups in descending composite order. Ties break on
/// lowest leverage, then highest YoY revenue growth; candidates missing a
/// tie-break metric lose that tie-break.
pub fn rank_candidates(bundles: &[CandidateBundle]) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = bundles.iter().map(score_candidate).collect();
    ranked.sort_by(|a, b| {
        b.composite
            .cmp(&a.composite)
            .then_with(|| {
                a.debt_to_equity
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.debt_to_equity.unwrap_or(f64::INFINITY))
            })
            .then_with(|| {
                b.revenue_yoy
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&a.revenue_yoy.unwrap_or(f64::NEG_INFINITY))
            })
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    ranked
}
