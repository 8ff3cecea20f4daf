// ============================================================================
// MODEL : UNVERIFIED USERS
// ============================================================================
//
// Signups waiting for their email OTP.
//
// Workflow:
//   1. POST /api/auth/signup stores (or replaces) a row here with a 6-digit
//      code and otp_expires_at = now + 1 hour
//   2. The code is emailed to the address
//   3. POST /api/auth/verify-otp checks the code and expiry, inserts into
//      users and deletes the row
//
// Points of attention:
//   - One row per email (unique), a new signup overwrites the pending one
//   - Expired rows are purged on every signup / verification
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unverified_users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub otp_code: String,
    pub otp_expires_at: DateTime,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
