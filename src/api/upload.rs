//! Multipart parsing of the post form
//!
//! Fields: `title`, `content`, `category`, `tags`, `published`,
//! `remove_image`, `image` (one file) and `gallery` (any number of files).
//! Checkboxes are true when present. File parts without a file name or
//! without data are skipped, which is what browsers send for an empty file
//! input.

use axum::{extract::multipart::MultipartError, extract::Multipart, http::StatusCode};

use crate::api::middleware::ApiError;
use crate::forms::PostForm;
use crate::services::UploadedFile;

/// Read a submitted post form
pub async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, ApiError> {
    let mut form = PostForm {
        published: false,
        ..PostForm::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "gallery" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                if file_name.is_empty() || data.is_empty() {
                    continue;
                }
                let file = UploadedFile {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                };
                if name == "image" {
                    form.image = Some(file);
                } else {
                    form.gallery.push(file);
                }
            }
            _ => {
                let value = field.text().await.map_err(multipart_error)?;
                match name.as_str() {
                    "title" => form.title = value,
                    "content" => form.content = value,
                    "category" => form.category = value,
                    "tags" => form.tags = value,
                    "published" => form.published = true,
                    "remove_image" => form.remove_image = true,
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new("PAYLOAD_TOO_LARGE", "Los archivos enviados superan el tamaño permitido.")
    } else {
        tracing::debug!(error = %e, "Malformed multipart body");
        ApiError::bad_request("No se pudo leer el formulario enviado.")
    }
}
