use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::services::checkout_service::StripeClient;
use crate::services::email_service::Mailer;

/// Shared by every handler through `web::Data<AppState>`.
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    /// None when STRIPE_SECRET_KEY is not configured
    pub stripe: Option<StripeClient>,
}
