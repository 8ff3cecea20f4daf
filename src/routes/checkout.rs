use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::errors::{AppError, Result};
use crate::middleware::MaybeAuthUser;
use crate::models::orders::{PaymentMethod, PaymentStatus};
use crate::services::checkout_service::{unix_now, verify_webhook_signature, StripeEvent};
use crate::services::order_service::OrderService;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub order_id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// What a webhook event means for the order it refers to
#[derive(Debug, PartialEq, Eq)]
enum PaymentOutcome {
    Paid,
    Failed,
    Ignored,
}

fn payment_outcome(event: &StripeEvent) -> PaymentOutcome {
    match event.event_type.as_str() {
        // Delayed payment methods complete the session before the money arrives
        "checkout.session.completed" => {
            match event.data.object.get("payment_status").and_then(|v| v.as_str()) {
                Some("paid") | Some("no_payment_required") => PaymentOutcome::Paid,
                _ => PaymentOutcome::Ignored,
            }
        }
        "checkout.session.async_payment_succeeded" => PaymentOutcome::Paid,
        "checkout.session.expired" | "checkout.session.async_payment_failed" => PaymentOutcome::Failed,
        _ => PaymentOutcome::Ignored,
    }
}

/// POST /api/checkout/session - hosted payment page for a card order
#[post("/session")]
#[instrument(skip_all, fields(order_id = body.order_id))]
pub async fn create_session(
    caller: MaybeAuthUser,
    body: web::Json<CreateSessionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| AppError::Config("Card payments are not configured".to_string()))?;

    let order = OrderService::find(&state.db, body.order_id).await?;

    // Orders placed while logged in can only be paid by their owner
    if let Some(owner) = order.user_id {
        let allowed = caller
            .0
            .as_ref()
            .map(|user| user.is_admin() || user.user_id == owner)
            .unwrap_or(false);
        if !allowed {
            return Err(AppError::Forbidden("You do not have access to this order".to_string()));
        }
    }
    if order.payment_method != PaymentMethod::Card {
        return Err(AppError::Validation("Order is not paid by card".to_string()));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Order is already paid".to_string()));
    }

    let base = state.config.app_base_url.trim_end_matches('/');
    let success_url = format!(
        "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}&order_id={}",
        base, order.id
    );
    let cancel_url = format!("{}/checkout/cancel?order_id={}", base, order.id);

    let session = stripe.create_checkout_session(&order, &success_url, &cancel_url).await?;
    OrderService::attach_checkout_session(&state.db, order, &session.id).await?;

    Ok(HttpResponse::Ok().json(CreateSessionResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// POST /api/checkout/webhook - signed Stripe events
#[post("/webhook")]
pub async fn webhook(
    req: HttpRequest,
    payload: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Config("STRIPE_WEBHOOK_SECRET is not configured".to_string()))?;

    let signature = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".to_string()))?;

    verify_webhook_signature(&payload, signature, secret, unix_now())?;

    let event: StripeEvent = serde_json::from_slice(&payload)
        .map_err(|e| AppError::Validation(format!("Invalid event payload: {}", e)))?;

    let outcome = payment_outcome(&event);
    if outcome != PaymentOutcome::Ignored {
        let session_id = event
            .session_id()
            .ok_or_else(|| AppError::Validation("Event has no session id".to_string()))?;

        match OrderService::apply_payment_result(&state.db, session_id, outcome == PaymentOutcome::Paid).await? {
            Some(order) => info!(
                event_id = %event.id,
                order_id = order.id,
                payment_status = ?order.payment_status,
                "Payment webhook applied"
            ),
            None => warn!(event_id = %event.id, %session_id, "No order for checkout session"),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}

pub fn checkout_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/checkout")
            .service(create_session)
            .service(webhook)
    );
}
