use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::dto::{CreateOrderRequest, OrderItemRequest, OrderQuote};
use crate::models::orders::{
    self, CustomerInfo, OrderItem, OrderItems, OrderStatus, PaymentStatus, Shipping,
};
use crate::models::{products, users};
use crate::services::designer;
use crate::services::promocode_service::{discount_for, PromocodeService};
use crate::services::shipping;
use crate::utils::money::round_cents;

pub struct OrderService;

/// subtotal - discount + shipping, with the discount clamped to the subtotal
pub fn compute_total(subtotal: Decimal, discount: Decimal, shipping_cost: Decimal) -> Decimal {
    round_cents(subtotal - discount.min(subtotal) + shipping_cost)
}

pub fn subtotal(items: &[OrderItem]) -> Decimal {
    round_cents(items.iter().map(OrderItem::line_total).sum())
}

/// Builds a line item from a request and the catalog product it names.
/// Catalog prices come from the database, design prices from the pricing
/// formula on top of the product price (or the default blank); nothing
/// price-related is taken from the client.
pub fn resolve_item(
    request: &OrderItemRequest,
    product: Option<&products::Model>,
) -> Result<OrderItem> {
    if let (Some(id), None) = (request.product_id, product) {
        return Err(AppError::NotFound(format!("Product {} not found", id)));
    }

    match (&request.design, product) {
        (Some(design), _) => {
            let base = product.map(|p| p.price).unwrap_or_else(designer::default_base_price);
            Ok(OrderItem {
                product_id: product.map(|p| p.id),
                name: product
                    .map(|p| format!("{} (custom design)", p.name))
                    .unwrap_or_else(|| "Custom t-shirt".to_string()),
                price: designer::price_on_base(design, base)?,
                quantity: request.quantity,
                size: request.size.clone(),
                color: Some(design.color.clone()),
                image: product.and_then(|p| p.images.first().cloned()),
                design: Some(design.clone()),
            })
        }
        (None, Some(product)) => {
            if let Some(size) = &request.size {
                if !product.sizes.is_empty() && !product.sizes.contains(size) {
                    return Err(AppError::Validation(format!(
                        "Size {} is not available for {}",
                        size, product.name
                    )));
                }
            }
            if let Some(color) = &request.color {
                if !product.colors.is_empty() && !product.colors.contains(color) {
                    return Err(AppError::Validation(format!(
                        "Color {} is not available for {}",
                        color, product.name
                    )));
                }
            }
            Ok(OrderItem {
                product_id: Some(product.id),
                name: product.name.clone(),
                price: product.price,
                quantity: request.quantity,
                size: request.size.clone(),
                color: request.color.clone(),
                image: product.images.first().cloned(),
                design: None,
            })
        }
        (None, None) => Err(AppError::Validation(
            "Each item needs a productId or a design".to_string(),
        )),
    }
}

/// Order counters for the admin dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: u64,
    pub revenue: Decimal,
    pub total_products: u64,
    pub total_customers: u64,
    pub orders_by_status: HashMap<String, u64>,
}

impl OrderService {
    async fn resolve_items<C: ConnectionTrait>(
        db: &C,
        requests: &[OrderItemRequest],
    ) -> Result<Vec<OrderItem>> {
        let ids: Vec<i32> = requests.iter().filter_map(|r| r.product_id).collect();
        let catalog: HashMap<i32, products::Model> = if ids.is_empty() {
            HashMap::new()
        } else {
            products::Entity::find()
                .filter(products::Column::Id.is_in(ids))
                .all(db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        requests
            .iter()
            .map(|r| resolve_item(r, r.product_id.and_then(|id| catalog.get(&id))))
            .collect()
    }

    /// Prices a cart. Promocodes are checked but not consumed.
    async fn price<C: ConnectionTrait>(db: &C, request: &CreateOrderRequest) -> Result<OrderQuote> {
        request.validate()?;

        let items = Self::resolve_items(db, &request.items).await?;
        let subtotal = subtotal(&items);

        let (discount, promocode) = match request.promocode.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let promo = PromocodeService::find_usable(db, code, Utc::now().naive_utc()).await?;
                (discount_for(&promo, subtotal), Some(promo.code))
            }
            _ => (Decimal::ZERO, None),
        };

        let shipping_cost = shipping::shipping_cost(&request.shipping.method, subtotal - discount)?;

        Ok(OrderQuote {
            total: compute_total(subtotal, discount, shipping_cost),
            items,
            subtotal,
            discount,
            shipping_cost,
            promocode,
        })
    }

    pub async fn quote(db: &DatabaseConnection, request: &CreateOrderRequest) -> Result<OrderQuote> {
        Self::price(db, request).await
    }

    /// Creates an order. Stock decrements and promocode redemption happen in
    /// the same transaction as the insert.
    #[instrument(skip(db, request), fields(user_id = ?user_id, items = request.items.len()))]
    pub async fn create(
        db: &DatabaseConnection,
        user_id: Option<i32>,
        request: CreateOrderRequest,
    ) -> Result<orders::Model> {
        let txn = db.begin().await?;
        let quote = Self::price(&txn, &request).await?;

        for item in &quote.items {
            if let Some(product_id) = item.product_id {
                Self::take_stock(&txn, product_id, item.quantity, &item.name).await?;
            }
        }

        if let Some(code) = &quote.promocode {
            PromocodeService::redeem(&txn, code, Utc::now().naive_utc()).await?;
        }

        let now = Utc::now().naive_utc();
        let customer = request.customer_info;
        let order = orders::ActiveModel {
            user_id: Set(user_id),
            items: Set(OrderItems(quote.items)),
            shipping: Set(Shipping {
                method: request.shipping.method,
                cost: quote.shipping_cost,
                address: request.shipping.address,
            }),
            customer_info: Set(CustomerInfo {
                name: customer.name,
                email: customer.email.trim().to_lowercase(),
                phone: customer.phone,
            }),
            subtotal: Set(quote.subtotal),
            discount: Set(quote.discount),
            shipping_cost: Set(quote.shipping_cost),
            total: Set(quote.total),
            promocode: Set(quote.promocode),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(request.payment_method),
            checkout_session_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(order_id = order.id, total = %order.total, "Order created");
        Ok(order)
    }

    /// Decrements stock only if enough is left.
    async fn take_stock<C: ConnectionTrait>(db: &C, product_id: i32, quantity: i32, name: &str) -> Result<()> {
        let result = products::Entity::update_many()
            .col_expr(products::Column::Stock, Expr::col(products::Column::Stock).sub(quantity))
            .filter(products::Column::Id.eq(product_id))
            .filter(products::Column::Stock.gte(quantity))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!("Insufficient stock for {}", name)));
        }
        Ok(())
    }

    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<orders::Model> {
        orders::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }

    pub async fn list_for_user(db: &DatabaseConnection, user_id: i32) -> Result<Vec<orders::Model>> {
        Ok(orders::Entity::find()
            .filter(orders::Column::UserId.eq(user_id))
            .order_by_desc(orders::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn list(db: &DatabaseConnection, status: Option<OrderStatus>) -> Result<Vec<orders::Model>> {
        let mut select = orders::Entity::find();
        if let Some(status) = status {
            select = select.filter(orders::Column::Status.eq(status));
        }
        Ok(select.order_by_desc(orders::Column::CreatedAt).all(db).await?)
    }

    /// Admin override: any status / payment status may be set, no transition rules.
    #[instrument(skip(db))]
    pub async fn update_status(
        db: &DatabaseConnection,
        id: i32,
        status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<orders::Model> {
        if status.is_none() && payment_status.is_none() {
            return Err(AppError::Validation(
                "Nothing to update: provide status and/or paymentStatus".to_string(),
            ));
        }

        let order = Self::find(db, id).await?;
        let mut active: orders::ActiveModel = order.into();
        if let Some(status) = status {
            active.status = Set(status);
        }
        if let Some(payment_status) = payment_status {
            active.payment_status = Set(payment_status);
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let order = active.update(db).await?;
        info!(order_id = id, status = ?order.status, payment_status = ?order.payment_status, "Order updated");
        Ok(order)
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<()> {
        let result = orders::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
        Ok(())
    }

    pub async fn attach_checkout_session(
        db: &DatabaseConnection,
        order: orders::Model,
        session_id: &str,
    ) -> Result<orders::Model> {
        let mut active: orders::ActiveModel = order.into();
        active.checkout_session_id = Set(Some(session_id.to_string()));
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(db).await?)
    }

    /// Applies a payment outcome reported by the payment provider.
    /// Returns None when no order carries that session id.
    pub async fn apply_payment_result(
        db: &DatabaseConnection,
        session_id: &str,
        paid: bool,
    ) -> Result<Option<orders::Model>> {
        let Some(order) = orders::Entity::find()
            .filter(orders::Column::CheckoutSessionId.eq(session_id))
            .one(db)
            .await?
        else {
            return Ok(None);
        };

        if order.payment_status == PaymentStatus::Paid {
            // Webhooks can be delivered more than once
            return Ok(Some(order));
        }

        let mut active: orders::ActiveModel = order.into();
        if paid {
            active.payment_status = Set(PaymentStatus::Paid);
            active.status = Set(OrderStatus::Processing);
        } else {
            active.payment_status = Set(PaymentStatus::Failed);
        }
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(Some(active.update(db).await?))
    }

    pub async fn dashboard_stats(db: &DatabaseConnection) -> Result<DashboardStats> {
        let total_orders = orders::Entity::find().count(db).await?;
        let total_products = products::Entity::find().count(db).await?;
        let total_customers = users::Entity::find()
            .filter(users::Column::Role.eq(users::Role::Customer))
            .count(db)
            .await?;

        let revenue = orders::Entity::find()
            .select_only()
            .column_as(orders::Column::Total.sum(), "revenue")
            .filter(orders::Column::PaymentStatus.eq(PaymentStatus::Paid))
            .into_tuple::<Option<Decimal>>()
            .one(db)
            .await?
            .flatten();

        let per_status = orders::Entity::find()
            .select_only()
            .column(orders::Column::Status)
            .column_as(orders::Column::Id.count(), "count")
            .group_by(orders::Column::Status)
            .into_tuple::<(OrderStatus, i64)>()
            .all(db)
            .await?;

        let orders_by_status = per_status
            .into_iter()
            .map(|(status, count)| {
                let key = serde_json::to_value(status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                (key, count.max(0) as u64)
            })
            .collect();

        Ok(DashboardStats {
            total_orders,
            revenue: round_cents(revenue.unwrap_or(Decimal::ZERO)),
            total_products,
            total_customers,
            orders_by_status,
        })
    }
}
