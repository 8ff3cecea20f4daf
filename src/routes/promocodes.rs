use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::{AppError, Result};
use crate::middleware::AdminUser;
use crate::models::promocodes::DiscountType;
use crate::services::promocode_service::{discount_for, PromocodeInput, PromocodeService};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ValidatePromocodeRequest {
    pub code: String,
    pub subtotal: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromocodeResponse {
    pub valid: bool,
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub discount: Decimal,
    pub discount_amount: Decimal,
}

/// POST /api/promocodes/validate - checks a code against a cart subtotal (PUBLIC).
/// Does not consume a use; that happens when the order is placed.
#[post("/validate")]
pub async fn validate_promocode(
    body: web::Json<ValidatePromocodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if body.subtotal < Decimal::ZERO {
        return Err(AppError::Validation("Subtotal cannot be negative".to_string()));
    }

    let promo = PromocodeService::find_usable(&state.db, &body.code, Utc::now().naive_utc()).await?;

    Ok(HttpResponse::Ok().json(ValidatePromocodeResponse {
        valid: true,
        discount_amount: discount_for(&promo, body.subtotal),
        code: promo.code,
        discount_type: promo.discount_type,
        discount: promo.discount,
    }))
}

#[get("")]
pub async fn list_promocodes(_admin: AdminUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let promocodes = PromocodeService::list(&state.db).await?;
    Ok(HttpResponse::Ok().json(promocodes))
}

#[post("")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn create_promocode(
    admin: AdminUser,
    body: web::Json<PromocodeInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let promo = PromocodeService::create(&state.db, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(promo))
}

#[put("/{id}")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn update_promocode(
    admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<PromocodeInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let promo = PromocodeService::update(&state.db, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(promo))
}

#[delete("/{id}")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn delete_promocode(
    admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    PromocodeService::delete(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn promocodes_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/promocodes")
            .service(validate_promocode)
            .service(list_promocodes)
            .service(create_promocode)
            .service(update_promocode)
            .service(delete_promocode)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::promocodes;
    use crate::models::users::Role;
    use crate::test_support::{bearer, test_state, test_state_with};
    use actix_web::{http::StatusCode, test, App};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn save10() -> promocodes::Model {
        promocodes::Model {
            id: 1,
            code: "SAVE10".to_string(),
            discount: Decimal::TEN,
            discount_type: DiscountType::Percentage,
            usage_count: 0,
            max_usage: Some(100),
            expires_at: None,
            is_active: true,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[actix_web::test]
    async fn validate_returns_discount_amount() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![save10()]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(promocodes_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/promocodes/validate")
            .set_json(serde_json::json!({ "code": "save10", "subtotal": 80.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "SAVE10");
        assert_eq!(body["type"], "percentage");
        assert_eq!(body["discountAmount"].as_f64(), Some(8.0));
    }

    #[actix_web::test]
    async fn creating_codes_is_admin_only() {
        let state = test_state();
        let token = bearer(&state, 4, Role::Customer);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(promocodes_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/promocodes")
            .insert_header(("Authorization", token))
            .set_json(serde_json::json!({ "code": "FREE", "discount": 100, "type": "percentage" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn admins_get_validation_errors_for_bad_definitions() {
        let state = test_state();
        let token = bearer(&state, 1, Role::Admin);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(promocodes_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/promocodes")
            .insert_header(("Authorization", token))
            .set_json(serde_json::json!({ "code": "TOO_MUCH", "discount": 150, "type": "percentage" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
