use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{get, post, web, HttpResponse, HttpResponseBuilder};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::middleware::{AuthUser, SESSION_COOKIE};
use crate::models::unverified_users::{self, Entity as UnverifiedUsers};
use crate::models::users::{self, Entity as Users, Role};
use crate::services::email_service;
use crate::state::AppState;
use crate::utils::password::MIN_PASSWORD_LENGTH;
use crate::utils::{jwt, otp, password};

#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub otp: String,
}

#[derive(Deserialize, Validate)]
pub struct ResendOtpRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Body returned with the session cookie after login / verification
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&users::Model> for UserResponse {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.app_base_url.starts_with("https://"))
        .max_age(time::Duration::hours(jwt::TOKEN_TTL_HOURS))
        .finish()
}

/// Signs a token for `user` and answers with it in both the cookie and the body.
fn session_response(
    state: &AppState,
    user: &users::Model,
    mut response: HttpResponseBuilder,
) -> Result<HttpResponse> {
    let token = jwt::generate_token(
        &state.config.jwt_secret,
        user.id,
        &user.email,
        &user.name,
        user.role,
    )
    .map_err(AppError::Internal)?;

    Ok(response
        .cookie(session_cookie(state, token.clone()))
        .json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }))
}

/// Drops pending signups whose OTP window is over.
async fn purge_expired_signups(db: &DatabaseConnection, now: NaiveDateTime) -> Result<()> {
    let result = UnverifiedUsers::delete_many()
        .filter(unverified_users::Column::OtpExpiresAt.lte(now))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!(purged = result.rows_affected, "Purged expired signups");
    }
    Ok(())
}

async fn send_otp(state: &AppState, email: &str, name: &str, code: &str) -> Result<()> {
    let message = email_service::otp_email(email, name, code)?;
    state.mailer.send(&message).await
}

/// POST /api/auth/signup - start a signup, emails an OTP (PUBLIC)
#[post("/signup")]
#[instrument(skip_all)]
pub async fn signup(
    body: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    body.validate()?;
    let db = &state.db;
    let email = normalize_email(&body.email);
    let now = Utc::now().naive_utc();

    purge_expired_signups(db, now).await?;

    let existing_user = Users::find()
        .filter(users::Column::Email.eq(&email))
        .one(db)
        .await?;
    if existing_user.is_some() {
        return Err(AppError::Conflict("An account with this email already exists".to_string()));
    }

    let password_hash = password::hash_password(&body.password).map_err(AppError::Internal)?;
    let code = otp::generate_code();
    let expires_at = otp::expires_at(now);

    let pending = UnverifiedUsers::find()
        .filter(unverified_users::Column::Email.eq(&email))
        .one(db)
        .await?;

    // A new signup replaces whatever was pending for this address
    match pending {
        Some(row) => {
            let mut active: unverified_users::ActiveModel = row.into();
            active.name = Set(body.name.trim().to_string());
            active.password_hash = Set(password_hash);
            active.otp_code = Set(code.clone());
            active.otp_expires_at = Set(expires_at);
            active.created_at = Set(now);
            active.update(db).await?;
        }
        None => {
            unverified_users::ActiveModel {
                email: Set(email.clone()),
                name: Set(body.name.trim().to_string()),
                password_hash: Set(password_hash),
                otp_code: Set(code.clone()),
                otp_expires_at: Set(expires_at),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    send_otp(&state, &email, body.name.trim(), &code).await?;
    info!(%email, "Signup pending verification");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Verification code sent",
        "email": email
    })))
}

/// POST /api/auth/verify-otp - confirm the OTP and create the account (PUBLIC)
#[post("/verify-otp")]
#[instrument(skip_all)]
pub async fn verify_otp(
    body: web::Json<VerifyOtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    body.validate()?;
    let db = &state.db;
    let email = normalize_email(&body.email);
    let now = Utc::now().naive_utc();

    let pending = UnverifiedUsers::find()
        .filter(unverified_users::Column::Email.eq(&email))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("No pending signup for this email".to_string()))?;

    if now >= pending.otp_expires_at {
        purge_expired_signups(db, now).await?;
        return Err(AppError::Validation("Verification code has expired, please sign up again".to_string()));
    }
    if !otp::is_valid(&pending.otp_code, &body.otp, pending.otp_expires_at, now) {
        return Err(AppError::Validation("Invalid verification code".to_string()));
    }

    let txn = db.begin().await?;
    let user = users::ActiveModel {
        email: Set(pending.email.clone()),
        name: Set(pending.name.clone()),
        password_hash: Set(pending.password_hash.clone()),
        role: Set(Role::Customer),
        is_verified: Set(true),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    UnverifiedUsers::delete_by_id(pending.id).exec(&txn).await?;
    txn.commit().await?;

    info!(user_id = user.id, "Account verified");
    session_response(&state, &user, HttpResponse::Created())
}

/// POST /api/auth/resend-otp - new code for a pending signup (PUBLIC)
#[post("/resend-otp")]
#[instrument(skip_all)]
pub async fn resend_otp(
    body: web::Json<ResendOtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    body.validate()?;
    let db = &state.db;
    let email = normalize_email(&body.email);
    let now = Utc::now().naive_utc();

    purge_expired_signups(db, now).await?;

    let pending = UnverifiedUsers::find()
        .filter(unverified_users::Column::Email.eq(&email))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("No pending signup for this email".to_string()))?;

    let code = otp::generate_code();
    let name = pending.name.clone();
    let mut active: unverified_users::ActiveModel = pending.into();
    active.otp_code = Set(code.clone());
    active.otp_expires_at = Set(otp::expires_at(now));
    active.update(db).await?;

    send_otp(&state, &email, &name, &code).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Verification code sent"
    })))
}

/// POST /api/auth/login - sets the session cookie (PUBLIC)
#[post("/login")]
#[instrument(skip_all)]
pub async fn login(
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = Users::find()
        .filter(users::Column::Email.eq(normalize_email(&body.email)))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    let is_valid = password::verify_password(&body.password, &user.password_hash)
        .map_err(AppError::Internal)?;
    if !is_valid {
        return Err(invalid());
    }

    info!(user_id = user.id, "User logged in");
    session_response(&state, &user, HttpResponse::Ok())
}

/// POST /api/auth/logout - clears the session cookie
#[post("/logout")]
pub async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();

    HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
        "success": true
    }))
}

/// GET /api/auth/me - current user (PROTECTED)
#[get("/me")]
pub async fn me(auth_user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = Users::find_by_id(auth_user.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// POST /api/auth/change-password (PROTECTED)
#[post("/change-password")]
#[instrument(skip_all, fields(user_id = auth_user.user_id))]
pub async fn change_password(
    auth_user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if body.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "New password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let user = Users::find_by_id(auth_user.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let is_valid = password::verify_password(&body.current_password, &user.password_hash)
        .map_err(AppError::Internal)?;
    if !is_valid {
        return Err(AppError::Unauthorized("Current password is incorrect".to_string()));
    }

    let new_password_hash = password::hash_password(&body.new_password).map_err(AppError::Internal)?;

    let mut active_model: users::ActiveModel = user.into();
    active_model.password_hash = Set(new_password_hash);
    active_model.update(&state.db).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(signup)
            .service(verify_otp)
            .service(resend_otp)
            .service(login)
            .service(logout)
            .service(me)
            .service(change_password)
    );
}
