//! Comment submission (`POST /post/{id}`)

use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};

use crate::api::flash::{redirect_with_flash, FlashMessage};
use crate::api::middleware::{ApiError, AppState};
use crate::api::posts::{parse_id, render_detail};
use crate::api::render::PageRequest;
use crate::forms::{CommentForm, FieldErrors};
use crate::services::CommentServiceError;

pub const LOGIN_TO_COMMENT: &str = "Tenés que iniciar sesión para comentar.";

/// Add a comment; anonymous visitors are sent to the login page
pub async fn add_comment(
    State(state): State<AppState>,
    page: PageRequest,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let post_url = format!("/post/{}", id);

    let Some(user) = page.user.clone() else {
        let target = format!("/login?next={}", urlencoding::encode(&post_url));
        return Ok(redirect_with_flash(&target, FlashMessage::error(LOGIN_TO_COMMENT)));
    };

    let errors = match form.validate() {
        Ok(content) => match state.comment_service.add(id, &user, &content).await {
            Ok(_) => {
                return Ok(redirect_with_flash(
                    &post_url,
                    FlashMessage::success("Comentario agregado correctamente."),
                ))
            }
            Err(CommentServiceError::ValidationError(message)) => {
                FieldErrors::single("content", message)
            }
            Err(e) => return Err(e.into()),
        },
        Err(errors) => errors,
    };

    render_detail(&state, &page, id, &form.content, &errors).await
}
