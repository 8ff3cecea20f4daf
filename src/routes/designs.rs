use actix_web::{post, web, HttpResponse};
use validator::Validate;

use crate::errors::Result;
use crate::models::dto::Design;
use crate::services::designer;

/// POST /api/designs/quote - price of a canvas design (PUBLIC)
#[post("/quote")]
pub async fn quote_design(body: web::Json<Design>) -> Result<HttpResponse> {
    body.validate()?;
    let price = designer::design_price(&body)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "price": price,
        "basePrice": body.base_price.unwrap_or_else(designer::default_base_price),
        "objectCount": body.objects.len()
    })))
}

pub fn designs_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/designs")
            .service(quote_design)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn prices_a_colored_design() {
        let app = test::init_service(App::new().configure(designs_routes)).await;

        let req = test::TestRequest::post()
            .uri("/designs/quote")
            .set_json(serde_json::json!({
                "color": "black",
                "objects": [
                    { "type": "text", "text": "Hello", "left": 10 },
                    { "type": "image", "src": "/api/upload/1" }
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        // 19.99 + 2 + 2 * 1.5
        let price = body["price"].as_f64().unwrap();
        assert!((price - 24.99).abs() < 1e-9);
        assert_eq!(body["objectCount"], 2);
    }

    #[actix_web::test]
    async fn rejects_missing_color() {
        let app = test::init_service(App::new().configure(designs_routes)).await;

        let req = test::TestRequest::post()
            .uri("/designs/quote")
            .set_json(serde_json::json!({ "color": "", "objects": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
