//! Stripe hosted checkout.
//!
//! The shop only marshals parameters: line items, shipping and discount go
//! to Stripe, the customer pays on Stripe's page, and a signed webhook tells
//! us how it went.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::orders;
use crate::utils::money::to_cents;

const STRIPE_API: &str = "https://api.stripe.com/v1";
const CURRENCY: &str = "usd";

/// Max age of a webhook signature timestamp, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Coupon {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Webhook payload, reduced to what we use
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    /// Id of the checkout session the event is about, if any
    pub fn session_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(Value::as_str)
    }
}

fn cents(amount: rust_decimal::Decimal) -> Result<String> {
    to_cents(amount)
        .map(|c| c.to_string())
        .ok_or_else(|| AppError::Payment(format!("Amount out of range: {}", amount)))
}

/// Form fields of a `POST /v1/checkout/sessions` call for an order.
pub fn checkout_session_form(
    order: &orders::Model,
    success_url: &str,
    cancel_url: &str,
    coupon_id: Option<&str>,
) -> Result<Vec<(String, String)>> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), success_url.into()),
        ("cancel_url".into(), cancel_url.into()),
        ("client_reference_id".into(), order.id.to_string()),
        ("customer_email".into(), order.customer_info.email.clone()),
        ("metadata[order_id]".into(), order.id.to_string()),
    ];

    let mut index = 0;
    for item in &order.items.0 {
        let prefix = format!("line_items[{}]", index);
        let mut name = item.name.clone();
        if let Some(size) = &item.size {
            name = format!("{} - {}", name, size);
        }
        form.push((format!("{}[price_data][currency]", prefix), CURRENCY.into()));
        form.push((format!("{}[price_data][product_data][name]", prefix), name));
        form.push((format!("{}[price_data][unit_amount]", prefix), cents(item.price)?));
        form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        if let Some(image) = item.image.as_deref().filter(|i| i.starts_with("https://")) {
            form.push((format!("{}[price_data][product_data][images][0]", prefix), image.into()));
        }
        index += 1;
    }

    if !order.shipping_cost.is_zero() {
        let prefix = format!("line_items[{}]", index);
        form.push((format!("{}[price_data][currency]", prefix), CURRENCY.into()));
        form.push((
            format!("{}[price_data][product_data][name]", prefix),
            format!("Shipping ({})", order.shipping.method),
        ));
        form.push((format!("{}[price_data][unit_amount]", prefix), cents(order.shipping_cost)?));
        form.push((format!("{}[quantity]", prefix), "1".into()));
    }

    if let Some(coupon) = coupon_id {
        form.push(("discounts[0][coupon]".into(), coupon.into()));
    }

    Ok(form)
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>[,v1=...]`).
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Validation("Malformed Stripe-Signature header".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::Validation("No v1 signature in Stripe-Signature header".to_string()));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::Validation("Webhook timestamp outside tolerance".to_string()));
    }

    for signature in &signatures {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(AppError::Validation("Invalid webhook signature".to_string()))
}

/// Stable for one order revision, so a retried request replays Stripe's
/// first answer. Any change to the order bumps `updated_at` and the key.
pub fn idempotency_key(order: &orders::Model, purpose: &str) -> String {
    let name = format!(
        "order:{}:{}:{}",
        order.id,
        purpose,
        order.updated_at.and_utc().timestamp_micros()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API.to_string(),
        }
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: &str,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Payment(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            warn!(%status, %message, path, "Stripe request failed");
            return Err(AppError::Payment(message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Payment(format!("Unexpected Stripe response: {}", e)))
    }

    /// One-off coupon carrying an order's promocode discount
    async fn create_coupon(&self, order: &orders::Model) -> Result<String> {
        let form = vec![
            ("amount_off".to_string(), cents(order.discount)?),
            ("currency".to_string(), CURRENCY.to_string()),
            ("duration".to_string(), "once".to_string()),
            (
                "name".to_string(),
                order.promocode.clone().unwrap_or_else(|| "Discount".to_string()),
            ),
        ];
        let coupon: Coupon = self
            .post_form("/coupons", &form, &idempotency_key(order, "coupon"))
            .await?;
        Ok(coupon.id)
    }

    #[instrument(skip(self, order), fields(order_id = order.id, total = %order.total))]
    pub async fn create_checkout_session(
        &self,
        order: &orders::Model,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let coupon = if order.discount.is_zero() {
            None
        } else {
            Some(self.create_coupon(order).await?)
        };

        let form = checkout_session_form(order, success_url, cancel_url, coupon.as_deref())?;
        let session: CheckoutSession = self
            .post_form("/checkout/sessions", &form, &idempotency_key(order, "session"))
            .await?;

        info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }
}

/// Current unix time, for signature checks
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
