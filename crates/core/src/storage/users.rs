use crate::domain::user::{Identity, UserRecord};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

type UserRow = (
    String,
    Option<String>,
    Option<String>,
    bool,
    bool,
    i32,
    Option<String>,
    DateTime<Utc>,
);

const USER_COLUMNS: &str =
    "id, email, display_name, is_anonymous, is_subscribed, usage_count, stripe_customer_id, created_at";

fn into_record(row: UserRow) -> UserRecord {
    let (id, email, display_name, is_anonymous, is_subscribed, usage_count, stripe_customer_id, created_at) =
        row;
    UserRecord {
        id,
        email,
        display_name,
        is_anonymous,
        is_subscribed,
        usage_count,
        stripe_customer_id,
        created_at,
    }
}

/// Upsert on first sight of an identity. Profile fields only ever fill in,
/// they never blank out an existing value.
pub async fn get_or_create(pool: &PgPool, identity: &Identity) -> anyhow::Result<UserRecord> {
    let row: UserRow = sqlx::query_as(&format!(
        "INSERT INTO users (id, email, display_name, is_anonymous) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE \
         SET email = COALESCE(EXCLUDED.email, users.email), \
             display_name = COALESCE(EXCLUDED.display_name, users.display_name), \
             is_anonymous = EXCLUDED.is_anonymous \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&identity.id)
    .bind(&identity.email)
    .bind(&identity.display_name)
    .bind(identity.is_anonymous)
    .fetch_one(pool)
    .await
    .context("upsert users failed")?;

    Ok(into_record(row))
}

/// Atomic quota consume: increments and returns the new count only when the
/// precondition (not subscribed, under quota) holds at commit time.
pub async fn try_consume_quota(
    pool: &PgPool,
    user_id: &str,
    quota: i32,
) -> anyhow::Result<Option<i32>> {
    let row: Option<(i32,)> = sqlx::query_as(
        "UPDATE users SET usage_count = usage_count + 1 \
         WHERE id = $1 AND is_subscribed = FALSE AND usage_count < $2 \
         RETURNING usage_count",
    )
    .bind(user_id)
    .bind(quota)
    .fetch_optional(pool)
    .await
    .context("conditional usage increment failed")?;

    Ok(row.map(|(count,)| count))
}

pub async fn set_stripe_customer_id(
    pool: &PgPool,
    user_id: &str,
    customer_id: &str,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET stripe_customer_id = $2 WHERE id = $1")
        .bind(user_id)
        .bind(customer_id)
        .execute(pool)
        .await
        .context("update stripe_customer_id failed")?;
    Ok(())
}

pub async fn find_by_stripe_customer_id(
    pool: &PgPool,
    customer_id: &str,
) -> anyhow::Result<Option<UserRecord>> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE stripe_customer_id = $1 LIMIT 1"
    ))
    .bind(customer_id)
    .fetch_optional(pool)
    .await
    .context("select user by stripe_customer_id failed")?;

    Ok(row.map(into_record))
}

pub async fn set_subscription_status(
    pool: &PgPool,
    user_id: &str,
    is_subscribed: bool,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET is_subscribed = $2 WHERE id = $1")
        .bind(user_id)
        .bind(is_subscribed)
        .execute(pool)
        .await
        .context("update is_subscribed failed")?;
    Ok(())
}
