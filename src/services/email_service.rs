//! Transactional email.
//!
//! Every code path sends through the [`Mailer`] trait; which provider sits
//! behind it (SendGrid, Resend, or only the log) is a configuration choice.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, EmailProvider};
use crate::errors::{AppError, Result};
use crate::models::orders;
use crate::utils::money::format_money;
use crate::utils::otp::OTP_TTL_MINUTES;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sender address used for every message.
    fn from_address(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[async_trait]
impl Mailer for SendGridMailer {
    fn from_address(&self) -> &str {
        &self.from
    }

    #[instrument(skip(self, email), fields(to = %email.to, provider = "sendgrid"))]
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html }
            ]
        });

        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        check_response(response).await?;
        info!("Email sent");
        Ok(())
    }
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[async_trait]
impl Mailer for ResendMailer {
    fn from_address(&self) -> &str {
        &self.from
    }

    #[instrument(skip(self, email), fields(to = %email.to, provider = "resend"))]
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let body = json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "text": email.text,
            "html": email.html
        });

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        check_response(response).await?;
        info!("Email sent");
        Ok(())
    }
}

/// Development mailer: logs instead of sending.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn from_address(&self) -> &str {
        &self.from
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.text, "Email not sent (log mailer)");
        Ok(())
    }
}

async fn check_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let detail = response.text().await.unwrap_or_default();
    warn!(%status, %detail, "Email provider rejected the message");
    Err(AppError::Email(format!("provider answered {}", status)))
}

pub fn build_mailer(config: &AppConfig) -> Arc<dyn Mailer> {
    let from = config.email_from.clone();
    match (config.email_provider, config.email_api_key.clone()) {
        (EmailProvider::SendGrid, Some(api_key)) => Arc::new(SendGridMailer {
            client: reqwest::Client::new(),
            api_key,
            from,
        }),
        (EmailProvider::Resend, Some(api_key)) => Arc::new(ResendMailer {
            client: reqwest::Client::new(),
            api_key,
            from,
        }),
        _ => Arc::new(LogMailer::new(from)),
    }
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

struct ItemLine {
    label: String,
    quantity: i32,
    line_total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    customer_name: &'a str,
    order_id: i32,
    items: &'a [ItemLine],
    subtotal: &'a str,
    discount: &'a str,
    shipping_method: &'a str,
    shipping_cost: &'a str,
    total: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    customer_name: &'a str,
    order_id: i32,
    items: &'a [ItemLine],
    subtotal: &'a str,
    discount: &'a str,
    shipping_method: &'a str,
    shipping_cost: &'a str,
    total: &'a str,
}

fn render_error(e: askama::Error) -> AppError {
    AppError::Internal(format!("Failed to render email: {}", e))
}

pub fn otp_email(to: &str, name: &str, code: &str) -> Result<OutgoingEmail> {
    let html = OtpEmailHtml { name, code, ttl_minutes: OTP_TTL_MINUTES }
        .render()
        .map_err(render_error)?;
    let text = OtpEmailText { name, code, ttl_minutes: OTP_TTL_MINUTES }
        .render()
        .map_err(render_error)?;

    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: "Your verification code".to_string(),
        text,
        html,
    })
}

pub fn order_confirmation_email(order: &orders::Model) -> Result<OutgoingEmail> {
    let items: Vec<ItemLine> = order
        .items
        .0
        .iter()
        .map(|item| ItemLine {
            label: match &item.size {
                Some(size) => format!("{} ({})", item.name, size),
                None => item.name.clone(),
            },
            quantity: item.quantity,
            line_total: format_money(item.line_total()),
        })
        .collect();

    let customer_name = order.customer_info.name.as_str();
    let shipping_method = order.shipping.method.as_str();
    let subtotal = format_money(order.subtotal);
    let discount = format_money(order.discount);
    let shipping_cost = format_money(order.shipping_cost);
    let total = format_money(order.total);

    let html = OrderConfirmationHtml {
        customer_name,
        order_id: order.id,
        items: &items,
        subtotal: &subtotal,
        discount: &discount,
        shipping_method,
        shipping_cost: &shipping_cost,
        total: &total,
    }
    .render()
    .map_err(render_error)?;

    let text = OrderConfirmationText {
        customer_name,
        order_id: order.id,
        items: &items,
        subtotal: &subtotal,
        discount: &discount,
        shipping_method,
        shipping_cost: &shipping_cost,
        total: &total,
    }
    .render()
    .map_err(render_error)?;

    Ok(OutgoingEmail {
        to: order.customer_info.email.clone(),
        subject: format!("Order #{} confirmed", order.id),
        text,
        html,
    })
}

#[derive(Template)]
#[template(path = "email/message.html")]
struct MessageHtml<'a> {
    paragraphs: Vec<&'a str>,
}

/// Free-form message written by an admin; the HTML part is the escaped text.
pub fn message_email(to: &str, subject: &str, content: &str) -> Result<OutgoingEmail> {
    let paragraphs = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let html = MessageHtml { paragraphs }.render().map_err(render_error)?;

    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        text: content.to_string(),
        html,
    })
}
