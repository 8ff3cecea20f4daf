// ============================================================================
// MODEL : PROMOCODES
// ============================================================================
//
// Points of attention:
//   - code is unique and stored upper-case
//   - usage_count only ever moves through a conditional UPDATE
//     (see services::promocode_service::redeem), never read-modify-write
//   - max_usage / expires_at NULL means unlimited / never expires
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// discount is a percentage of the subtotal (1..=100)
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// discount is an amount of money
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promocodes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount: Decimal,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub usage_count: i32,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime>,
    pub is_active: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
