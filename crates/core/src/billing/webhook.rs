use crate::billing::stripe::StripeClient;
use crate::error::AnalysisError;
use crate::storage;
use anyhow::Context;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;

type HmacSha256 = Hmac<Sha256>;

/// Signed timestamps outside this window are rejected, replayed or not.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifies a `t=<unix>,v1=<hex>` signature header: HMAC-SHA256 of
/// `"<t>.<payload>"` under the endpoint secret. Comparison is constant-time
/// via `Mac::verify_slice`. Nothing downstream runs until this passes.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: DateTime<Utc>,
) -> Result<(), AnalysisError> {
    let (timestamp, candidates) =
        parse_signature_header(header).ok_or(AnalysisError::WebhookVerification)?;

    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AnalysisError::WebhookVerification);
    }

    for candidate in candidates {
        let Ok(signature) = hex::decode(&candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AnalysisError::WebhookVerification)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&signature).is_ok() {
            return Ok(());
        }
    }

    Err(AnalysisError::WebhookVerification)
}

fn parse_signature_header(header: &str) -> Option<(i64, Vec<String>)> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value.to_string()),
            // Other signature schemes are ignored.
            _ => {}
        }
    }
    let timestamp = timestamp?;
    if candidates.is_empty() {
        return None;
    }
    Some((timestamp, candidates))
}

/// The subset of provider events this system reacts to. Everything else is
/// accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    SubscriptionChanged { customer_id: String, active: bool },
    CheckoutCompleted { subscription_id: String },
    Ignored { kind: String },
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    customer: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
}

pub fn parse_event(payload: &[u8]) -> anyhow::Result<WebhookEvent> {
    let envelope: EventEnvelope =
        serde_json::from_slice(payload).context("webhook payload is not a valid event")?;

    let event = match envelope.kind.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let subscription: SubscriptionObject = serde_json::from_value(envelope.data.object)
                .context("subscription event object missing fields")?;
            WebhookEvent::SubscriptionChanged {
                customer_id: subscription.customer,
                active: subscription.status.as_deref() == Some("active"),
            }
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = serde_json::from_value(envelope.data.object)
                .context("subscription event object missing fields")?;
            WebhookEvent::SubscriptionChanged {
                customer_id: subscription.customer,
                active: false,
            }
        }
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(envelope.data.object)
                .context("checkout session event object missing fields")?;
            match (session.mode.as_deref(), session.subscription) {
                (Some("subscription"), Some(subscription_id)) => {
                    WebhookEvent::CheckoutCompleted { subscription_id }
                }
                _ => WebhookEvent::Ignored {
                    kind: envelope.kind.clone(),
                },
            }
        }
        _ => WebhookEvent::Ignored {
            kind: envelope.kind.clone(),
        },
    };

    Ok(event)
}

/// Applies one verified event. Mutating the same flag twice is a no-op, so
/// replayed events are harmless.
pub async fn apply_event(
    pool: &PgPool,
    stripe: &StripeClient,
    event: WebhookEvent,
) -> anyhow::Result<()> {
    match event {
        WebhookEvent::SubscriptionChanged {
            customer_id,
            active,
        } => set_subscription_by_customer(pool, &customer_id, active).await,
        WebhookEvent::CheckoutCompleted { subscription_id } => {
            // The session carries only the subscription id; resolve it to get
            // the customer this checkout belongs to.
            let subscription = stripe.retrieve_subscription(&subscription_id).await?;
            set_subscription_by_customer(pool, &subscription.customer_id, true).await
        }
        WebhookEvent::Ignored { kind } => {
            tracing::debug!(%kind, "ignoring unmapped webhook event");
            Ok(())
        }
    }
}

async fn set_subscription_by_customer(
    pool: &PgPool,
    customer_id: &str,
    active: bool,
) -> anyhow::Result<()> {
    match storage::users::find_by_stripe_customer_id(pool, customer_id).await? {
        Some(user) => {
            storage::users::set_subscription_status(pool, &user.id, active).await?;
            tracing::info!(user_id = %user.id, active, "subscription status updated");
            Ok(())
        }
        None => {
            tracing::warn!(%customer_id, "no user found for payment customer id; ignoring event");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={signature}")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_a_freshly_signed_payload() {
        let payload = br#"{"type":"customer.subscription.created"}"#;
        let header = sign_payload("whsec_test", payload, now().timestamp());
        assert!(verify_signature("whsec_test", payload, &header, now()).is_ok());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let header = sign_payload("whsec_test", b"original", now().timestamp());
        assert!(verify_signature("whsec_test", b"tampered", &header, now()).is_err());
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let payload = b"payload";
        let header = sign_payload("whsec_other", payload, now().timestamp());
        assert!(verify_signature("whsec_test", payload, &header, now()).is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = b"payload";
        let stale = now().timestamp() - SIGNATURE_TOLERANCE_SECS - 1;
        let header = sign_payload("whsec_test", payload, stale);
        assert!(verify_signature("whsec_test", payload, &header, now()).is_err());
    }

    #[test]
    fn accepts_any_matching_v1_candidate() {
        let payload = b"payload";
        let ts = now().timestamp();
        let good = sign_payload("whsec_test", payload, ts);
        let v1 = good.split("v1=").nth(1).unwrap();
        let header = format!("t={ts},v1=deadbeef,v1={v1}");
        assert!(verify_signature("whsec_test", payload, &header, now()).is_ok());
    }

    #[test]
    fn rejects_garbage_headers() {
        for header in ["", "t=,v1=", "v1=abcd", "t=123", "nonsense"] {
            assert!(
                verify_signature("whsec_test", b"payload", header, now()).is_err(),
                "header: {header}"
            );
        }
    }

    fn subscription_event(kind: &str, status: &str) -> Vec<u8> {
        json!({
            "type": kind,
            "data": {"object": {"customer": "cus_123", "status": status}}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn active_subscription_events_turn_the_flag_on() {
        for kind in ["customer.subscription.created", "customer.subscription.updated"] {
            let event = parse_event(&subscription_event(kind, "active")).unwrap();
            assert_eq!(
                event,
                WebhookEvent::SubscriptionChanged {
                    customer_id: "cus_123".to_string(),
                    active: true,
                }
            );
        }
    }

    #[test]
    fn inactive_update_turns_the_flag_off() {
        let event =
            parse_event(&subscription_event("customer.subscription.updated", "past_due")).unwrap();
        assert_eq!(
            event,
            WebhookEvent::SubscriptionChanged {
                customer_id: "cus_123".to_string(),
                active: false,
            }
        );
    }

    #[test]
    fn deletion_turns_the_flag_off_regardless_of_status() {
        let event =
            parse_event(&subscription_event("customer.subscription.deleted", "active")).unwrap();
        assert_eq!(
            event,
            WebhookEvent::SubscriptionChanged {
                customer_id: "cus_123".to_string(),
                active: false,
            }
        );
    }

    #[test]
    fn subscription_mode_checkout_resolves_the_subscription() {
        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"mode": "subscription", "subscription": "sub_42"}}
        })
        .to_string();
        let event = parse_event(payload.as_bytes()).unwrap();
        assert_eq!(
            event,
            WebhookEvent::CheckoutCompleted {
                subscription_id: "sub_42".to_string(),
            }
        );
    }

    #[test]
    fn payment_mode_checkout_is_ignored() {
        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"mode": "payment"}}
        })
        .to_string();
        let event = parse_event(payload.as_bytes()).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { .. }));
    }

    #[test]
    fn unmapped_event_types_are_ignored_not_errors() {
        let payload = json!({
            "type": "invoice.paid",
            "data": {"object": {}}
        })
        .to_string();
        let event = parse_event(payload.as_bytes()).unwrap();
        assert_eq!(
            event,
            WebhookEvent::Ignored {
                kind: "invoice.paid".to_string(),
            }
        );
    }

    #[test]
    fn replaying_an_event_parses_identically() {
        let payload = subscription_event("customer.subscription.created", "active");
        assert_eq!(parse_event(&payload).unwrap(), parse_event(&payload).unwrap());
    }
}
