// Request / response shapes shared between routes and services
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::orders::{Address, OrderItem, PaymentMethod};
use super::{products, reviews};

/// A t-shirt designed on the canvas. The object list is whatever the canvas
/// library serialized; only the count and the shirt color affect the price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    pub base_price: Option<Decimal>,
    #[validate(length(min = 1, max = 32))]
    pub color: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub objects: Vec<DesignObject>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    /// Catalog product; leave empty when `design` is set
    pub product_id: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    #[validate(nested)]
    pub design: Option<Design>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRequest {
    #[validate(length(min = 1))]
    pub method: String,
    #[validate(nested)]
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfoRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 50), nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(nested)]
    pub shipping: ShippingRequest,
    #[validate(nested)]
    pub customer_info: CustomerInfoRequest,
    pub payment_method: PaymentMethod,
    pub promocode: Option<String>,
}

/// Priced cart, before (quote) or at (order) creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub promocode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ProductWithReviews {
    #[serde(flatten)]
    pub product: products::Model,
    pub reviews: Vec<reviews::Model>,
}
