use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// One catalog row per tradable issuer. `bundle_path` is the opaque reference
/// the client sends back as a `bundle_ref` when requesting analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: String,
    pub company_name: String,
    pub bundle_path: String,
}

pub async fn list(pool: &PgPool) -> anyhow::Result<Vec<StockRecord>> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT ticker, company_name, bundle_path FROM stocks ORDER BY ticker ASC",
    )
    .fetch_all(pool)
    .await
    .context("select stocks failed")?;

    Ok(rows
        .into_iter()
        .map(|(ticker, company_name, bundle_path)| StockRecord {
            ticker,
            company_name,
            bundle_path,
        })
        .collect())
}
