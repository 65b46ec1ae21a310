use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row per identity, created lazily on first request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub is_subscribed: bool,
    pub usage_count: i32,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller identity as presented on a request. `id` is the only field the gate
/// cares about; the rest enriches the lazily-created user row.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
}
