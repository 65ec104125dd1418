//! Post create/edit form

use super::{max_length, required, FieldErrors};
use crate::models::PostDetail;
use crate::services::{PostSubmission, UploadedFile};
use serde::Serialize;

/// Column limit of `posts.title`
pub const MAX_TITLE_LENGTH: usize = 200;

pub const EMPTY_CONTENT: &str = "El contenido no puede estar vacío.";
pub const INVALID_CHOICE: &str = "Escoja una opción válida. Esa opción no es una de las disponibles.";

/// Values of the post form. Text fields are echoed back when the form is
/// re-rendered; uploads are not.
#[derive(Debug, Clone, Serialize)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    /// Selected category id, empty for none
    pub category: String,
    pub tags: String,
    pub published: bool,
    pub remove_image: bool,
    #[serde(skip)]
    pub image: Option<UploadedFile>,
    #[serde(skip)]
    pub gallery: Vec<UploadedFile>,
}

impl Default for PostForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            category: String::new(),
            tags: String::new(),
            published: true,
            remove_image: false,
            image: None,
            gallery: Vec::new(),
        }
    }
}

impl PostForm {
    /// Form pre-filled from an existing post
    pub fn from_detail(detail: &PostDetail) -> Self {
        let post = &detail.card.post;
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
            tags: detail.tags_text(),
            published: post.published,
            ..Self::default()
        }
    }

    /// Check the form and hand over its uploads.
    ///
    /// On error the form keeps its files and text so it can be shown again.
    pub fn validate(&mut self) -> Result<PostSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = required(&mut errors, "title", &self.title);
        max_length(&mut errors, "title", &title, MAX_TITLE_LENGTH);

        let content = self.content.trim();
        if content.is_empty() || content == "&nbsp;" {
            errors.add("content", EMPTY_CONTENT);
        }

        let category = self.category.trim();
        let category_id = if category.is_empty() {
            None
        } else {
            match category.parse::<i64>() {
                Ok(id) if id > 0 => Some(id),
                _ => {
                    errors.add("category", INVALID_CHOICE);
                    None
                }
            }
        };

        if let Some(image) = &self.image {
            if !image.is_image() {
                errors.add("image", "Suba una imagen válida. El archivo que subió no era una imagen o estaba dañado.");
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(PostSubmission {
            title,
            content: content.to_string(),
            category_id,
            published: self.published,
            tags: self.tags.clone(),
            image: self.image.take(),
            remove_image: self.remove_image,
            gallery: std::mem::take(&mut self.gallery)
                .into_iter()
                .filter(UploadedFile::is_image)
                .collect(),
        })
    }
}
