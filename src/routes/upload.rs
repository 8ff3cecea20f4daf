use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::StreamExt;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::middleware::AdminUser;
use crate::models::uploads::{self, Entity as Uploads};
use crate::state::AppState;

/// 5 MiB
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// Last path segment of a client-supplied name, capped at 255 chars.
fn clean_filename(raw: Option<&str>) -> String {
    let name = raw
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        return "upload".to_string();
    }
    name.chars().take(255).collect()
}

fn image_content_type(req: &HttpRequest) -> Result<String> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !content_type.starts_with("image/") {
        return Err(AppError::Validation("Only image uploads are accepted".to_string()));
    }
    Ok(content_type)
}

fn too_large() -> AppError {
    AppError::PayloadTooLarge(format!("Uploads are limited to {} bytes", MAX_UPLOAD_BYTES))
}

/// Buffers the body, giving up as soon as it passes the upload limit.
async fn read_limited(req: &HttpRequest, mut payload: web::Payload) -> Result<web::BytesMut> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > MAX_UPLOAD_BYTES) {
        return Err(too_large());
    }

    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::Validation(format!("Could not read upload: {}", e)))?;
        if body.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// POST /api/upload?filename= - raw image body (ADMIN)
#[post("")]
#[instrument(skip_all, fields(admin_id = admin.0.user_id))]
pub async fn upload_image(
    admin: AdminUser,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let content_type = image_content_type(&req)?;
    let body = read_limited(&req, payload).await?;
    if body.is_empty() {
        return Err(AppError::Validation("Upload body is empty".to_string()));
    }

    let upload = uploads::ActiveModel {
        filename: Set(clean_filename(query.filename.as_deref())),
        content_type: Set(content_type),
        size: Set(body.len() as i64),
        data: Set(body.to_vec()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!(upload_id = upload.id, filename = %upload.filename, size = upload.size, "Image uploaded");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": upload.id,
        "url": format!("/api/upload/{}", upload.id),
        "filename": upload.filename,
        "size": upload.size
    })))
}

/// GET /api/upload/{id} - the stored bytes (PUBLIC)
#[get("/{id}")]
pub async fn get_image(path: web::Path<i32>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let upload = Uploads::find_by_id(path.into_inner())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(upload.content_type)
        .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
        .body(upload.data))
}

pub fn upload_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/upload")
            .service(upload_image)
            .service(get_image)
    );
}
