use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::*;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::middleware::AdminUser;
use crate::models::emails::{self, Category, Entity as Emails, Status};
use crate::services::email_service;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EmailListQuery {
    pub category: Option<Category>,
    pub starred: Option<bool>,
}

#[derive(Deserialize, Validate)]
pub struct SendEmailRequest {
    #[validate(email)]
    pub to: String,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailRequest {
    pub is_read: Option<bool>,
    pub is_starred: Option<bool>,
    pub category: Option<Category>,
}

#[derive(Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

async fn find_email(db: &DatabaseConnection, id: i32) -> Result<emails::Model> {
    Emails::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))
}

/// GET /api/emails?category=&starred= (ADMIN)
#[get("")]
pub async fn list_emails(
    _admin: AdminUser,
    query: web::Query<EmailListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut select = Emails::find();
    if let Some(category) = query.category {
        select = select.filter(emails::Column::Category.eq(category));
    }
    if let Some(starred) = query.starred {
        select = select.filter(emails::Column::IsStarred.eq(starred));
    }

    let emails = select
        .order_by_desc(emails::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(emails))
}

/// GET /api/emails/{id} - opening a message marks it read (ADMIN)
#[get("/{id}")]
pub async fn get_email(
    _admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let email = find_email(&state.db, path.into_inner()).await?;
    if email.is_read {
        return Ok(HttpResponse::Ok().json(email));
    }

    let mut active: emails::ActiveModel = email.into();
    active.is_read = Set(true);
    let email = active.update(&state.db).await?;

    Ok(HttpResponse::Ok().json(email))
}

/// POST /api/emails/send - sends through the mailer and keeps a copy in `sent` (ADMIN)
#[post("/send")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn send_email(
    admin: AdminUser,
    body: web::Json<SendEmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    body.validate()?;
    let message = email_service::message_email(body.to.trim(), &body.subject, &body.content)?;

    let outcome = state.mailer.send(&message).await;
    let status = match &outcome {
        Ok(()) => Status::Sent,
        Err(e) => {
            warn!(to = %message.to, error = %e, "Outgoing email failed");
            Status::Failed
        }
    };

    let record = emails::ActiveModel {
        from_address: Set(state.mailer.from_address().to_string()),
        to_address: Set(message.to.clone()),
        subject: Set(message.subject.clone()),
        content: Set(message.text.clone()),
        category: Set(Category::Sent),
        status: Set(status),
        is_read: Set(true),
        is_starred: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    // The failed attempt is on record; the caller still gets the provider error
    outcome?;
    info!(email_id = record.id, "Email sent");
    Ok(HttpResponse::Created().json(record))
}

/// PATCH /api/emails/{id} - read / starred flags and folder (ADMIN)
#[patch("/{id}")]
pub async fn update_email(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<UpdateEmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if body.is_read.is_none() && body.is_starred.is_none() && body.category.is_none() {
        return Err(AppError::Validation(
            "Nothing to update: provide isRead, isStarred and/or category".to_string(),
        ));
    }

    let email = find_email(&state.db, path.into_inner()).await?;
    let mut active: emails::ActiveModel = email.into();
    if let Some(is_read) = body.is_read {
        active.is_read = Set(is_read);
    }
    if let Some(is_starred) = body.is_starred {
        active.is_starred = Set(is_starred);
    }
    if let Some(category) = body.category {
        active.category = Set(category);
    }

    Ok(HttpResponse::Ok().json(active.update(&state.db).await?))
}

/// DELETE /api/emails/{id} - moves to trash; a second delete removes the row (ADMIN)
#[delete("/{id}")]
pub async fn delete_email(
    _admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let email = find_email(&state.db, path.into_inner()).await?;

    if email.category == Category::Trash {
        Emails::delete_by_id(email.id).exec(&state.db).await?;
        return Ok(HttpResponse::NoContent().finish());
    }

    let mut active: emails::ActiveModel = email.into();
    active.category = Set(Category::Trash);
    Ok(HttpResponse::Ok().json(active.update(&state.db).await?))
}

/// POST /api/contact - visitor message, lands in the admin inbox (PUBLIC)
#[post("/contact")]
#[instrument(skip_all)]
pub async fn contact(
    body: web::Json<ContactRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    body.validate()?;
    let to = state
        .config
        .admin_email
        .clone()
        .unwrap_or_else(|| state.config.email_from.clone());

    let email = emails::ActiveModel {
        from_address: Set(body.email.trim().to_lowercase()),
        to_address: Set(to),
        subject: Set(body.subject.trim().to_string()),
        content: Set(format!("{}\n\n{}", body.name.trim(), body.message.trim())),
        category: Set(Category::Inbox),
        status: Set(Status::Received),
        is_read: Set(false),
        is_starred: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!(email_id = email.id, "Contact message received");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Thanks, we will get back to you soon"
    })))
}

pub fn emails_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(contact).service(
        web::scope("/emails")
            .service(list_emails)
            .service(send_email)
            .service(get_email)
            .service(update_email)
            .service(delete_email)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::Role;
    use crate::test_support::{bearer, test_state, test_state_with};
    use actix_web::{http::StatusCode, test, App};

    fn inbox_email(id: i32, category: Category) -> emails::Model {
        emails::Model {
            id,
            from_address: "visitor@example.com".to_string(),
            to_address: "admin@example.com".to_string(),
            subject: "Sizing".to_string(),
            content: "Does the tee run small?".to_string(),
            category,
            status: Status::Received,
            is_read: false,
            is_starred: false,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[actix_web::test]
    async fn contact_form_is_validated() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(emails_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/contact")
            .set_json(serde_json::json!({ "name": "V", "email": "nope", "subject": "Hi", "message": "Hello" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn contact_form_stores_inbox_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![inbox_email(1, Category::Inbox)]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(emails_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/contact")
            .set_json(serde_json::json!({
                "name": "Vic", "email": "visitor@example.com", "subject": "Sizing", "message": "Does the tee run small?"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn deleting_from_trash_removes_the_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![inbox_email(5, Category::Trash)]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let state = test_state_with(db);
        let token = bearer(&state, 1, Role::Admin);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(emails_routes),
        )
        .await;

        let req = test::TestRequest::delete()
            .uri("/emails/5")
            .insert_header(("Authorization", token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn deleting_from_inbox_moves_to_trash() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![inbox_email(6, Category::Inbox)]])
            .append_query_results([vec![inbox_email(6, Category::Trash)]])
            .into_connection();
        let state = test_state_with(db);
        let token = bearer(&state, 1, Role::Admin);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(emails_routes),
        )
        .await;

        let req = test::TestRequest::delete()
            .uri("/emails/6")
            .insert_header(("Authorization", token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["category"], "trash");
    }
}
