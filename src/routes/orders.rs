use actix_web::{delete, get, patch, post, web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::errors::{AppError, Result};
use crate::middleware::{AdminUser, AuthUser, MaybeAuthUser};
use crate::models::dto::CreateOrderRequest;
use crate::models::orders::{OrderStatus, PaymentStatus};
use crate::services::email_service;
use crate::services::order_service::OrderService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// POST /api/orders - place an order, guests allowed
#[post("")]
#[instrument(skip_all)]
pub async fn create_order(
    caller: MaybeAuthUser,
    body: web::Json<CreateOrderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = caller.0.as_ref().map(|user| user.user_id);
    let order = OrderService::create(&state.db, user_id, body.into_inner()).await?;

    // The order stands even if the confirmation cannot be delivered
    match email_service::order_confirmation_email(&order) {
        Ok(message) => {
            if let Err(e) = state.mailer.send(&message).await {
                warn!(order_id = order.id, error = %e, "Order confirmation email failed");
            }
        }
        Err(e) => warn!(order_id = order.id, error = %e, "Order confirmation email not rendered"),
    }

    Ok(HttpResponse::Created().json(order))
}

/// POST /api/orders/quote - price a cart without placing it (PUBLIC)
#[post("/quote")]
pub async fn quote_order(
    body: web::Json<CreateOrderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let quote = OrderService::quote(&state.db, &body).await?;
    Ok(HttpResponse::Ok().json(quote))
}

/// GET /api/orders/mine - caller's order history (PROTECTED)
#[get("/mine")]
pub async fn my_orders(auth_user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let orders = OrderService::list_for_user(&state.db, auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// GET /api/orders?status= - all orders (ADMIN)
#[get("")]
pub async fn list_orders(
    _admin: AdminUser,
    query: web::Query<OrderListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let orders = OrderService::list(&state.db, query.status).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// GET /api/orders/{id} - admins, or the customer who placed it
#[get("/{id}")]
pub async fn get_order(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let order = OrderService::find(&state.db, path.into_inner()).await?;

    if !auth_user.is_admin() && order.user_id != Some(auth_user.user_id) {
        return Err(AppError::Forbidden("You do not have access to this order".to_string()));
    }

    Ok(HttpResponse::Ok().json(order))
}

#[patch("/{id}")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn update_order(
    admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<UpdateOrderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let order = OrderService::update_status(&state.db, path.into_inner(), body.status, body.payment_status).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[delete("/{id}")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn delete_order(
    admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    OrderService::delete(&state.db, id).await?;
    info!(order_id = id, "Order deleted");
    Ok(HttpResponse::NoContent().finish())
}

pub fn orders_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .service(create_order)
            .service(quote_order)
            .service(my_orders)
            .service(list_orders)
            .service(get_order)
            .service(update_order)
            .service(delete_order)
    );
}
