use anyhow::Context;
use sqlx::PgPool;

pub async fn insert(
    pool: &PgPool,
    original_feedback: &str,
    summary: &str,
) -> anyhow::Result<uuid::Uuid> {
    let id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO feedback (original_feedback, summary) VALUES ($1, $2) RETURNING id",
    )
    .bind(original_feedback)
    .bind(summary)
    .fetch_one(pool)
    .await
    .context("insert feedback failed")?;

    Ok(id)
}
