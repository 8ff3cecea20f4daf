use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::*;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::models::promocodes::{self, DiscountType};
use crate::utils::money::round_cents;

pub struct PromocodeService;

/// Admin payload for creating or replacing a promocode
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromocodeInput {
    pub code: String,
    pub discount: Decimal,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl PromocodeInput {
    /// Normalized code and expiry, after the definition rules passed
    fn checked(&self, now: NaiveDateTime) -> Result<(String, Option<NaiveDateTime>)> {
        let code = normalize_code(&self.code);
        let expires_at = self.expires_at.map(|e| e.naive_utc());
        validate_definition(&code, self.discount_type, self.discount, self.max_usage, expires_at, now)?;
        Ok((code, expires_at))
    }
}

/// Upper-cases and trims a code as typed by a customer.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// `^[A-Z0-9_-]{3,20}$` on the normalized code
pub fn is_valid_code_format(code: &str) -> bool {
    (3..=20).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Rules for a new (or edited) promocode.
pub fn validate_definition(
    code: &str,
    discount_type: DiscountType,
    discount: Decimal,
    max_usage: Option<i32>,
    expires_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<()> {
    if !is_valid_code_format(code) {
        return Err(AppError::Validation(
            "Code must be 3-20 characters of A-Z, 0-9, '_' or '-'".to_string(),
        ));
    }

    match discount_type {
        DiscountType::Percentage if discount < Decimal::ONE || discount > Decimal::ONE_HUNDRED => {
            return Err(AppError::Validation(
                "Percentage discount must be between 1 and 100".to_string(),
            ));
        }
        DiscountType::Fixed if discount <= Decimal::ZERO => {
            return Err(AppError::Validation(
                "Fixed discount must be greater than 0".to_string(),
            ));
        }
        _ => {}
    }

    if matches!(max_usage, Some(max) if max < 1) {
        return Err(AppError::Validation("Max usage must be at least 1".to_string()));
    }

    if matches!(expires_at, Some(expiry) if expiry <= now) {
        return Err(AppError::Validation("Expiry date must be in the future".to_string()));
    }

    Ok(())
}

/// Amount taken off `subtotal`, rounded to cents and never above it.
pub fn discount_for(promo: &promocodes::Model, subtotal: Decimal) -> Decimal {
    let raw = match promo.discount_type {
        DiscountType::Percentage => subtotal * promo.discount / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => promo.discount,
    };
    round_cents(raw.min(subtotal).max(Decimal::ZERO))
}

/// Whether a loaded promocode can still be used at `now`.
pub fn check_usable(promo: &promocodes::Model, now: NaiveDateTime) -> Result<()> {
    if !promo.is_active {
        return Err(AppError::Validation("Promocode is not active".to_string()));
    }
    if matches!(promo.expires_at, Some(expiry) if expiry <= now) {
        return Err(AppError::Validation("Promocode has expired".to_string()));
    }
    if matches!(promo.max_usage, Some(max) if promo.usage_count >= max) {
        return Err(AppError::Validation("Promocode usage limit reached".to_string()));
    }
    Ok(())
}

impl PromocodeService {
    pub async fn list(db: &DatabaseConnection) -> Result<Vec<promocodes::Model>> {
        Ok(promocodes::Entity::find()
            .order_by_desc(promocodes::Column::CreatedAt)
            .all(db)
            .await?)
    }

    #[instrument(skip(db, input), fields(code = %input.code))]
    pub async fn create(db: &DatabaseConnection, input: PromocodeInput) -> Result<promocodes::Model> {
        let now = Utc::now().naive_utc();
        let (code, expires_at) = input.checked(now)?;

        let promo = promocodes::ActiveModel {
            code: Set(code),
            discount: Set(input.discount),
            discount_type: Set(input.discount_type),
            usage_count: Set(0),
            max_usage: Set(input.max_usage),
            expires_at: Set(expires_at),
            is_active: Set(input.is_active),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(promocode_id = promo.id, "Promocode created");
        Ok(promo)
    }

    /// Replaces a code's definition; its usage count is kept.
    pub async fn update(db: &DatabaseConnection, id: i32, input: PromocodeInput) -> Result<promocodes::Model> {
        let (code, expires_at) = input.checked(Utc::now().naive_utc())?;

        let existing = promocodes::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Promocode not found".to_string()))?;

        let mut active: promocodes::ActiveModel = existing.into();
        active.code = Set(code);
        active.discount = Set(input.discount);
        active.discount_type = Set(input.discount_type);
        active.max_usage = Set(input.max_usage);
        active.expires_at = Set(expires_at);
        active.is_active = Set(input.is_active);

        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<()> {
        let result = promocodes::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Promocode not found".to_string()));
        }
        Ok(())
    }

    /// Loads a code and checks it is usable, without consuming it.
    pub async fn find_usable<C: ConnectionTrait>(
        db: &C,
        code: &str,
        now: NaiveDateTime,
    ) -> Result<promocodes::Model> {
        let promo = promocodes::Entity::find()
            .filter(promocodes::Column::Code.eq(normalize_code(code)))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Promocode not found".to_string()))?;

        check_usable(&promo, now)?;
        Ok(promo)
    }

    /// Consumes one use of a code.
    ///
    /// The limit, expiry and active checks are part of the UPDATE itself, so
    /// two concurrent redemptions of the last use cannot both succeed.
    #[instrument(skip(db))]
    pub async fn redeem<C: ConnectionTrait>(db: &C, code: &str, now: NaiveDateTime) -> Result<()> {
        let code = normalize_code(code);

        let result = promocodes::Entity::update_many()
            .col_expr(
                promocodes::Column::UsageCount,
                Expr::col(promocodes::Column::UsageCount).add(1),
            )
            .filter(promocodes::Column::Code.eq(code.as_str()))
            .filter(promocodes::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(promocodes::Column::MaxUsage.is_null())
                    .add(
                        Expr::col(promocodes::Column::UsageCount)
                            .lt(Expr::col(promocodes::Column::MaxUsage)),
                    ),
            )
            .filter(
                Condition::any()
                    .add(promocodes::Column::ExpiresAt.is_null())
                    .add(promocodes::Column::ExpiresAt.gt(now)),
            )
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "Promocode {} is no longer available",
                code
            )));
        }

        info!(%code, "Promocode redeemed");
        Ok(())
    }
}
