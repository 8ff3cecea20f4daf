// Fixtures shared by the unit tests

use std::sync::Arc;

use actix_web::web;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};

use crate::config::AppConfig;
use crate::models::orders::{
    self, Address, CustomerInfo, OrderItem, OrderItems, OrderStatus, PaymentMethod, PaymentStatus,
    Shipping,
};
use crate::models::products;
use crate::models::users::Role;
use crate::services::email_service::LogMailer;
use crate::state::AppState;
use crate::utils::jwt;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| {
        let value = match key {
            "DATABASE_URL" => "postgres://localhost/shop_test",
            "JWT_SECRET" => TEST_JWT_SECRET,
            "APP_BASE_URL" => "http://localhost:5173",
            "STRIPE_WEBHOOK_SECRET" => "whsec_test",
            "EMAIL_FROM" => "shop@example.com",
            "ADMIN_EMAIL" => "admin@example.com",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test configuration")
}

/// State over an empty mock database (any query fails).
pub fn test_state() -> AppState {
    test_state_with(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
}

pub fn test_state_with(db: DatabaseConnection) -> AppState {
    let config = test_config();
    AppState {
        db,
        mailer: Arc::new(LogMailer::new(config.email_from.clone())),
        stripe: None,
        config: Arc::new(config),
    }
}

/// Debug dump of every statement the mock database ran. The test service
/// (and any response) holding `state` must be dropped first.
pub fn statements_run(state: web::Data<AppState>) -> String {
    let state = Arc::try_unwrap(state.into_inner())
        .ok()
        .expect("state is still held by the test service");
    format!("{:?}", state.db.into_transaction_log())
}

/// `Authorization` header value for a user signed with the state's secret
pub fn bearer(state: &AppState, user_id: i32, role: Role) -> String {
    let token = jwt::generate_token(
        &state.config.jwt_secret,
        user_id,
        &format!("user{}@example.com", user_id),
        "Test User",
        role,
    )
    .expect("token");
    format!("Bearer {}", token)
}

pub fn sample_product(id: i32, price: Decimal) -> products::Model {
    let now = Utc::now().naive_utc();
    products::Model {
        id,
        name: "Classic Tee".to_string(),
        description: "Heavyweight cotton t-shirt".to_string(),
        price,
        images: vec!["https://cdn.example.com/classic-tee.jpg".to_string()],
        colors: vec!["white".to_string(), "black".to_string()],
        sizes: vec!["S".to_string(), "M".to_string(), "L".to_string(), "XL".to_string()],
        category: Some("t-shirts".to_string()),
        stock: 25,
        rating: Decimal::ZERO,
        review_count: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Two Classic Tees (M) at 25.00 with standard shipping, no discount.
pub fn sample_order() -> orders::Model {
    let now = Utc::now().naive_utc();
    orders::Model {
        id: 1,
        user_id: None,
        items: OrderItems(vec![OrderItem {
            product_id: Some(3),
            name: "Classic Tee".to_string(),
            price: Decimal::new(2500, 2),
            quantity: 2,
            size: Some("M".to_string()),
            color: Some("white".to_string()),
            image: Some("https://cdn.example.com/classic-tee.jpg".to_string()),
            design: None,
        }]),
        shipping: Shipping {
            method: "standard".to_string(),
            cost: Decimal::new(499, 2),
            address: Address {
                line1: "1 Main St".to_string(),
                line2: None,
                city: "Springfield".to_string(),
                state: Some("IL".to_string()),
                postal_code: "62701".to_string(),
                country: "US".to_string(),
            },
        },
        customer_info: CustomerInfo {
            name: "Ann Buyer".to_string(),
            email: "ann@example.com".to_string(),
            phone: None,
        },
        subtotal: Decimal::new(5000, 2),
        discount: Decimal::ZERO,
        shipping_cost: Decimal::new(499, 2),
        total: Decimal::new(5499, 2),
        promocode: None,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Card,
        checkout_session_id: None,
        created_at: now,
        updated_at: now,
    }
}
