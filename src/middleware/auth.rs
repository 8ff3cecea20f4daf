use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::users::Role;
use crate::state::AppState;
use crate::utils::jwt;

/// Name of the HttpOnly cookie carrying the session JWT
pub const SESSION_COOKIE: &str = "token";

/// Authenticated caller, extracted from the session cookie or a Bearer header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Same as [`AuthUser`] but rejects anyone who is not an admin (403)
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// For routes open to guests: `None` when no credentials were sent.
/// Credentials that are present but invalid are still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

fn token_from_request(req: &HttpRequest) -> Result<Option<String>, AppError> {
    if let Some(header) = req.headers().get("Authorization") {
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;
        return match value.strip_prefix("Bearer ") {
            Some(token) => Ok(Some(token.trim().to_string())),
            None => Err(AppError::Unauthorized(
                "Invalid Authorization format (expected: Bearer <token>)".to_string(),
            )),
        };
    }

    Ok(req
        .cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty()))
}

fn authenticate(req: &HttpRequest) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = token_from_request(req)? else {
        return Ok(None);
    };

    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("Application state is not configured".to_string()))?;

    let claims = jwt::verify_token(&state.config.jwt_secret, &token).map_err(AppError::Unauthorized)?;

    Ok(Some(AuthUser {
        user_id: claims.sub,
        email: claims.email,
        name: claims.name,
        role: claims.role,
    }))
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = authenticate(req).and_then(|user| {
            user.ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
        });
        ready(result.map_err(Error::from))
    }
}

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = authenticate(req).and_then(|user| match user {
            Some(user) if user.is_admin() => Ok(AdminUser(user)),
            Some(_) => Err(AppError::Forbidden("Admin access required".to_string())),
            None => Err(AppError::Unauthorized("Authentication required".to_string())),
        });
        ready(result.map_err(Error::from))
    }
}

impl FromRequest for MaybeAuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map(MaybeAuthUser).map_err(Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    fn token_for(state: &AppState, role: Role) -> String {
        jwt::generate_token(&state.config.jwt_secret, 7, "sam@example.com", "Sam", role).unwrap()
    }

    #[actix_web::test]
    async fn reads_token_from_cookie() {
        let state = test_state();
        let token = token_for(&state, Role::Customer);
        let req = TestRequest::default()
            .app_data(web::Data::new(state))
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.role, Role::Customer);
    }

    #[actix_web::test]
    async fn reads_token_from_bearer_header() {
        let state = test_state();
        let token = token_for(&state, Role::Admin);
        let req = TestRequest::default()
            .app_data(web::Data::new(state))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let AdminUser(user) = AdminUser::extract(&req).await.unwrap();
        assert!(user.is_admin());
    }

    #[actix_web::test]
    async fn customers_are_not_admins() {
        let state = test_state();
        let token = token_for(&state, Role::Customer);
        let req = TestRequest::default()
            .app_data(web::Data::new(state))
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_http_request();

        let err = AdminUser::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn guests_are_allowed_where_optional() {
        let req = TestRequest::default()
            .app_data(web::Data::new(test_state()))
            .to_http_request();

        assert!(MaybeAuthUser::extract(&req).await.unwrap().0.is_none());
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn rejects_tampered_tokens() {
        let req = TestRequest::default()
            .app_data(web::Data::new(test_state()))
            .insert_header(("Authorization", "Bearer not.a.jwt"))
            .to_http_request();

        assert!(MaybeAuthUser::extract(&req).await.is_err());
    }
}
