use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use profitscout_core::billing::stripe::StripeClient;
use profitscout_core::billing::webhook;
use profitscout_core::bundle::HttpJsonBundleStore;
use profitscout_core::domain::recommendation::RecommendationResult;
use profitscout_core::domain::request::{AnalysisRequest, ChatMessage};
use profitscout_core::domain::user::Identity;
use profitscout_core::error::{AnalysisError, Refusal};
use profitscout_core::llm::anthropic::AnthropicClient;
use profitscout_core::llm::LlmClient;
use profitscout_core::prompt::{FeedbackSummaryPrompt, FollowUpPrompt, PromptLibrary};
use profitscout_core::router::RequestRouter;
use profitscout_core::storage;
use profitscout_core::usage;

const FOLLOW_UP_SYSTEM: &str =
    "You are ProfitScout's follow-up assistant. Answer concisely, grounded only in the \
     conversation and recommendation provided.";
const FEEDBACK_SYSTEM: &str =
    "You summarize user feedback for the ProfitScout team. Reply with the summary only.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = profitscout_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match profitscout_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    // Missing keys here are configuration errors; unlike a database outage
    // they do not get a degraded mode.
    let prompts = Arc::new(PromptLibrary::new()?);
    let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::from_settings(&settings)?);
    let bundles = Arc::new(HttpJsonBundleStore::from_settings(&settings)?);
    let stripe = Arc::new(StripeClient::from_settings(&settings)?);
    let webhook_secret = settings.require_stripe_webhook_secret()?.to_string();

    let router = Arc::new(RequestRouter::new(
        prompts.clone(),
        bundles,
        llm.clone(),
    ));

    let state = AppState {
        pool,
        prompts,
        llm,
        router,
        stripe,
        webhook_secret,
        settings,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/stocks", get(list_stocks))
        .route("/analysis", post(get_recommendation))
        .route("/follow-up", post(follow_up))
        .route("/feedback", post(submit_feedback))
        .route("/checkout-session", post(create_checkout_session))
        .route("/stripe/webhook", post(stripe_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    prompts: Arc<PromptLibrary>,
    llm: Arc<dyn LlmClient>,
    router: Arc<RequestRouter>,
    stripe: Arc<StripeClient>,
    webhook_secret: String,
    settings: profitscout_core::config::Settings,
}

/// What the analysis endpoint returns: either the recommendation or a typed
/// refusal telling the client to show a paywall or sign-in prompt.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnalysisResponse {
    Result(RecommendationResult),
    Refusal(Refusal),
}

async fn get_recommendation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, StatusCode> {
    let Some(identity) = identity_from_headers(&headers) else {
        return Ok(Json(AnalysisResponse::Refusal(Refusal::auth())));
    };

    if let Err(e) = request.validate() {
        tracing::warn!(error = %e, "rejected analysis request");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let user = storage::users::get_or_create(pool, &identity)
        .await
        .map_err(internal)?;

    // The gate must settle before anything is fetched or generated.
    match usage::check_and_consume(pool, &user).await.map_err(internal)? {
        usage::Outcome::Denied => {
            tracing::warn!(user_id = %user.id, "usage limit reached");
            return Ok(Json(AnalysisResponse::Refusal(Refusal::subscription())));
        }
        usage::Outcome::Granted { usage_count } => {
            if let Some(count) = usage_count {
                tracing::info!(user_id = %user.id, usage_count = count, "metered analysis granted");
            }
        }
    }

    let result = state
        .router
        .handle(&request)
        .await
        .map_err(|e| match e.downcast_ref::<AnalysisError>() {
            Some(AnalysisError::DataFetch { .. }) | Some(AnalysisError::OutputValidation(_)) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "analysis dispatch failed");
                StatusCode::BAD_GATEWAY
            }
            _ => internal(e),
        })?;

    Ok(Json(AnalysisResponse::Result(result)))
}

#[derive(Debug, Deserialize)]
struct FollowUpRequest {
    question: String,
    #[serde(default)]
    tickers: Vec<String>,
    initial_recommendation: String,
    #[serde(default)]
    chat_history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct FollowUpResponse {
    answer: String,
}

// Follow-up chat is deliberately not usage-gated; only initial analyses are
// metered.
async fn follow_up(
    State(state): State<AppState>,
    Json(request): Json<FollowUpRequest>,
) -> Result<Json<FollowUpResponse>, StatusCode> {
    if request.question.trim().is_empty()
        || request.tickers.is_empty()
        || request.tickers.len() > 2
    {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let prompt = state
        .prompts
        .follow_up(&FollowUpPrompt {
            question: &request.question,
            ticker1: &request.tickers[0],
            ticker2: request.tickers.get(1).map(String::as_str),
            initial_recommendation: &request.initial_recommendation,
            chat_history: &request.chat_history,
        })
        .map_err(internal)?;

    let answer = state
        .llm
        .complete_text(FOLLOW_UP_SYSTEM, &prompt)
        .await
        .map_err(internal)?;

    Ok(Json(FollowUpResponse { answer }))
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    feedback: String,
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<StatusCode, StatusCode> {
    if request.feedback.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let prompt = state
        .prompts
        .feedback_summary(&FeedbackSummaryPrompt {
            feedback: &request.feedback,
        })
        .map_err(internal)?;

    let summary = state
        .llm
        .complete_text(FEEDBACK_SYSTEM, &prompt)
        .await
        .map_err(internal)?;

    let id = storage::feedback::insert(pool, &request.feedback, summary.trim())
        .await
        .map_err(internal)?;
    tracing::info!(feedback_id = %id, "feedback stored");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    session_id: String,
}

async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CheckoutResponse>, StatusCode> {
    let Some(identity) = identity_from_headers(&headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let Some(price_id) = state.settings.stripe_price_id.as_deref() else {
        return Err(internal(
            AnalysisError::Configuration("STRIPE_PRICE_ID").into(),
        ));
    };

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| state.settings.app_base_url.clone());
    let Some(origin) = origin else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let user = storage::users::get_or_create(pool, &identity)
        .await
        .map_err(internal)?;

    let customer_id = match user.stripe_customer_id {
        Some(id) => id,
        None => {
            let id = state
                .stripe
                .create_customer(&user.id, user.email.as_deref())
                .await
                .map_err(internal)?;
            storage::users::set_stripe_customer_id(pool, &user.id, &id)
                .await
                .map_err(internal)?;
            id
        }
    };

    let return_url = format!("{}/dashboard", origin.trim_end_matches('/'));
    let session_id = state
        .stripe
        .create_subscription_checkout(&customer_id, price_id, &return_url, &return_url)
        .await
        .map_err(internal)?;

    Ok(Json(CheckoutResponse { session_id }))
}

async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if let Err(e) =
        webhook::verify_signature(&state.webhook_secret, body.as_bytes(), signature, Utc::now())
    {
        tracing::warn!(error = %e, "webhook signature verification failed");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid signature"})),
        ));
    }

    let event = webhook::parse_event(body.as_bytes()).map_err(|e| {
        tracing::warn!(error = %e, "webhook payload failed to parse");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid payload"})),
        )
    })?;

    let Some(pool) = &state.pool else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "database unavailable"})),
        ));
    };

    webhook::apply_event(pool, &state.stripe, event)
        .await
        .map_err(|e| {
            (
                internal(e),
                Json(json!({"error": "event handling failed"})),
            )
        })?;

    Ok(Json(json!({"received": true})))
}

async fn list_stocks(
    State(state): State<AppState>,
) -> Result<Json<Vec<storage::stocks::StockRecord>>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let stocks = storage::stocks::list(pool).await.map_err(internal)?;
    Ok(Json(stocks))
}

fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let id = headers.get("x-user-id")?.to_str().ok()?.trim().to_string();
    if id.is_empty() {
        return None;
    }

    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Some(Identity {
        id,
        email: text("x-user-email"),
        display_name: text("x-user-name"),
        is_anonymous: text("x-user-anonymous").is_some_and(|v| v == "true"),
    })
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "internal error");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &profitscout_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn header_map(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn identity_requires_a_user_id() {
        assert!(identity_from_headers(&header_map(&[])).is_none());
        assert!(identity_from_headers(&header_map(&[("x-user-id", "  ")])).is_none());
    }

    #[test]
    fn identity_picks_up_optional_profile_headers() {
        let headers = header_map(&[
            ("x-user-id", "uid-1"),
            ("x-user-email", "a@example.com"),
            ("x-user-name", "Alex"),
            ("x-user-anonymous", "true"),
        ]);
        let identity = identity_from_headers(&headers).unwrap();
        assert_eq!(identity.id, "uid-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Alex"));
        assert!(identity.is_anonymous);
    }

    #[test]
    fn identity_defaults_to_non_anonymous() {
        let identity = identity_from_headers(&header_map(&[("x-user-id", "uid-2")])).unwrap();
        assert!(!identity.is_anonymous);
        assert!(identity.email.is_none());
    }

    #[test]
    fn refusals_and_results_serialize_as_a_flat_union() {
        let refusal = AnalysisResponse::Refusal(Refusal::subscription());
        let v = serde_json::to_value(&refusal).unwrap();
        assert_eq!(v["required"], "subscription");

        let result = AnalysisResponse::Result(RecommendationResult {
            recommendation: "HOLD - fairly valued.".to_string(),
            reasoning: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            sections_overview: None,
        });
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["recommendation"], "HOLD - fairly valued.");
        assert!(v.get("required").is_none());
    }
}
