use actix_web::{delete, get, post, put, web, HttpResponse};
use tracing::instrument;

use crate::errors::Result;
use crate::middleware::{AdminUser, AuthUser};
use crate::services::product_service::{ProductInput, ProductQuery, ProductService, ReviewInput};
use crate::state::AppState;

/// GET /api/products - filtered, sorted, paginated catalog (PUBLIC)
#[get("")]
pub async fn list_products(
    query: web::Query<ProductQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = ProductService::list(&state.db, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/products/{id} - product with its reviews (PUBLIC)
#[get("/{id}")]
pub async fn get_product(path: web::Path<i32>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let product = ProductService::get_with_reviews(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

#[post("")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn create_product(
    admin: AdminUser,
    body: web::Json<ProductInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let product = ProductService::create(&state.db, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(product))
}

#[put("/{id}")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn update_product(
    admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<ProductInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let product = ProductService::update(&state.db, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

#[delete("/{id}")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn delete_product(
    admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    ProductService::delete(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/products/{id}/reviews - one review per user, resubmitting replaces it (PROTECTED)
#[post("/{id}/reviews")]
pub async fn add_review(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<ReviewInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let review = ProductService::upsert_review(&state.db, path.into_inner(), &auth_user, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(review))
}

pub fn products_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .service(list_products)
            .service(create_product)
            .service(get_product)
            .service(update_product)
            .service(delete_product)
            .service(add_review)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::products;
    use crate::test_support::{bearer, sample_product, test_state, test_state_with};
    use crate::models::users::Role;
    use actix_web::{http::StatusCode, test, App};
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn detail_includes_reviews() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_product(3, Decimal::new(2500, 2))]])
            .append_query_results([Vec::<crate::models::reviews::Model>::new()])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(products_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/products/3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], 3);
        assert_eq!(body["reviews"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn unknown_product_is_404() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<products::Model>::new()])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(products_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/products/99").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn customers_cannot_create_products() {
        let state = test_state();
        let token = bearer(&state, 7, Role::Customer);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(products_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/products")
            .insert_header(("Authorization", token))
            .set_json(serde_json::json!({ "name": "Tee", "price": 10.0, "stock": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn reviews_require_login() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(products_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/products/3/reviews")
            .set_json(serde_json::json!({ "rating": 5 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
