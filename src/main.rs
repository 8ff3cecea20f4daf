mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
mod utils;
#[cfg(test)]
mod test_support;

use std::io;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::checkout_service::StripeClient;
use crate::services::email_service::build_mailer;
use crate::state::AppState;

const JSON_BODY_LIMIT: usize = 1024 * 1024;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,sea_orm=warn"));

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().map_err(startup_error)?;

    info!("Connecting to database...");
    let db = db::establish_connection(&config).await.map_err(startup_error)?;
    db::sync_schema(&db).await.map_err(startup_error)?;
    db::ensure_admin(&db, &config).await.map_err(startup_error)?;
    info!("Database ready");

    let state = AppState {
        db,
        mailer: build_mailer(&config),
        stripe: config.stripe_secret_key.clone().map(StripeClient::new),
        config: Arc::new(config),
    };
    let bind_address = state.config.bind_address();
    let state = web::Data::new(state);

    info!(address = %bind_address, "Starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_BODY_LIMIT)
                    .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
            )
            .configure(routes::configure_routes)
    })
        .bind(bind_address)?
        .run()
        .await
}
