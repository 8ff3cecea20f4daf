use actix_web::{get, web, HttpResponse};

use crate::errors::Result;
use crate::middleware::AdminUser;
use crate::services::order_service::OrderService;
use crate::state::AppState;

/// GET /api/admin/stats - dashboard counters (ADMIN)
#[get("/stats")]
pub async fn dashboard_stats(_admin: AdminUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = OrderService::dashboard_stats(&state.db).await?;
    Ok(HttpResponse::Ok().json(stats))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(dashboard_stats)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::Role;
    use crate::test_support::{bearer, test_state};
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn stats_need_admin_role() {
        let state = test_state();
        let token = bearer(&state, 3, Role::Customer);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(admin_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/admin/stats").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/admin/stats")
            .insert_header(("Authorization", token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
