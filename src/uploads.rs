use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    debug_handler,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::{config::Config, AppError, AppResult, AppState};

pub const UPLOADS_PATH: &str = "/uploads";
// room for the multipart framing around the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl From<&Config> for UploadSettings {
    fn from(config: &Config) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    image_url: String,
}

pub fn router(settings: &UploadSettings) -> Router<AppState> {
    Router::new()
        .route(
            "/api/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(settings.max_bytes + MULTIPART_OVERHEAD)),
        )
        .nest_service(UPLOADS_PATH, ServeDir::new(&settings.dir))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn upload_image(
    State(settings): State<Arc<UploadSettings>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }

        if !field.content_type().is_some_and(|ct| ct.starts_with("image/")) {
            return Err(AppError::Validation("only image files can be uploaded".to_owned()));
        }

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::Validation("the uploaded image is empty".to_owned()));
        }
        if bytes.len() > settings.max_bytes {
            return Err(AppError::Validation(format!(
                "images must be at most {} bytes",
                settings.max_bytes
            )));
        }

        let name = random_file_name();
        tokio::fs::create_dir_all(&settings.dir)
            .await
            .context("create upload dir")?;
        tokio::fs::write(settings.dir.join(&name), &bytes)
            .await
            .context("write uploaded image")?;
        tracing::info!(file = %name, size = bytes.len(), "image uploaded");

        return Ok(Json(UploadResponse {
            image_url: format!("{UPLOADS_PATH}/{name}"),
        }));
    }

    Err(AppError::Validation("no image selected".to_owned()))
}

fn random_file_name() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_random_hex() {
        let a = random_file_name();
        let b = random_file_name();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
