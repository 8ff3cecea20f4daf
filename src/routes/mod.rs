pub mod admin;
pub mod auth;
pub mod checkout;
pub mod designs;
pub mod emails;
pub mod health;
pub mod orders;
pub mod products;
pub mod promocodes;
pub mod upload;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(products::products_routes)
            .configure(orders::orders_routes)
            .configure(admin::admin_routes)
            .configure(promocodes::promocodes_routes)
            .configure(checkout::checkout_routes)
            .configure(emails::emails_routes)
            .configure(upload::upload_routes)
            .configure(designs::designs_routes)
    );
}
