mod auth;

pub use auth::{AdminUser, AuthUser, MaybeAuthUser, SESSION_COOKIE};
