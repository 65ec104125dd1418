//! Post pages
//!
//! - `GET /` listing with filters, categories and featured tags
//! - `GET /post/{id}` detail with comments
//! - `GET|POST /crear` create (staff only)
//! - `GET|POST /editar/{id}` edit (author or staff)
//! - `GET|POST /post/{id}/eliminar` confirm and delete (author or staff)
//! - `GET /perfil` the current user's posts

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
};
use tera::Context as TeraContext;

use crate::api::flash::{redirect_with_flash, FlashMessage};
use crate::api::middleware::{ApiError, AppState, RequireUser};
use crate::api::render::PageRequest;
use crate::api::upload::read_post_form;
use crate::forms::post::INVALID_CHOICE;
use crate::forms::{FieldErrors, PostForm};
use crate::models::{PostDetail, PostListQuery};
use crate::services::PostServiceError;

pub const CREATE_DENIED: &str = "No tenés permisos para crear publicaciones.";
pub const EDIT_DENIED: &str = "No tenés permisos para editar esta publicación.";
pub const DELETE_DENIED: &str = "No tenés permisos para eliminar esta publicación.";
pub const FORM_HAS_ERRORS: &str = "Por favor corregí los errores del formulario.";

/// Numeric path id; anything else is a missing page
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::not_found("La página que buscás no existe."))
}

/// Turn a permission failure into a redirect home with a notice
fn forbidden_redirect(error: PostServiceError, message: &str) -> Result<Response, ApiError> {
    match error {
        PostServiceError::Forbidden => Ok(redirect_with_flash("/", FlashMessage::error(message))),
        other => Err(other.into()),
    }
}

/// GET / - Public listing
pub async fn index(
    State(state): State<AppState>,
    page: PageRequest,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let query = PostListQuery::from_pairs(pairs);
    let listing = state.post_service.list_public(&query).await?;
    let categories = state.category_service.list().await?;
    let featured_tags = state.tag_service.featured().await?;

    let mut context = TeraContext::new();
    context.insert("posts", &listing.page.items);
    context.insert("pager", &listing.page.pager());
    context.insert("filter", &listing.filter);
    context.insert("filter_query", &listing.filter.to_query_string());
    context.insert("categories", &categories);
    context.insert("featured_tags", &featured_tags);
    page.render(&state, "index.html", &mut context)
}

/// GET /post/{id} - Post detail
pub async fn detail(
    State(state): State<AppState>,
    page: PageRequest,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    render_detail(&state, &page, id, "", &FieldErrors::new()).await
}

/// Render the detail page with the comment form in the given state
pub(crate) async fn render_detail(
    state: &AppState,
    page: &PageRequest,
    id: i64,
    comment_text: &str,
    errors: &FieldErrors,
) -> Result<Response, ApiError> {
    let detail = state.post_service.get_detail(id, page.user.as_ref()).await?;
    let comments = state.comment_service.list_for_post(id).await?;
    let can_edit = page
        .user
        .as_ref()
        .is_some_and(|u| u.can_edit(detail.card.post.author_id));

    let mut context = TeraContext::new();
    context.insert("post", &detail);
    context.insert("comments", &comments);
    context.insert("can_edit", &can_edit);
    context.insert("comment_text", comment_text);
    context.insert("errors", errors);
    page.render(state, "post_detail.html", &mut context)
}

async fn render_form(
    state: &AppState,
    page: &PageRequest,
    form: &PostForm,
    errors: &FieldErrors,
    post: Option<&PostDetail>,
) -> Result<Response, ApiError> {
    let categories = state.category_service.list().await?;
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("categories", &categories);
    context.insert("post", &post);
    context.insert("is_edit", &post.is_some());
    page.render(state, "post_form.html", &mut context)
}

/// Map a failed write to field errors, or give up on the request
fn submission_errors(error: PostServiceError, action: &str) -> Result<FieldErrors, PostServiceError> {
    match error {
        PostServiceError::InvalidCategory(_) => Ok(FieldErrors::single("category", INVALID_CHOICE)),
        PostServiceError::InvalidImage(message) => Ok(FieldErrors::single("image", message)),
        PostServiceError::InternalError(e) => {
            tracing::error!(error = %format!("{:#}", e), "Post write failed");
            Ok(FieldErrors::single(
                FieldErrors::FORM,
                format!("Error al {} la publicación: {}", action, e),
            ))
        }
        other => Err(other),
    }
}

/// GET /crear - Empty post form
pub async fn create_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    page: PageRequest,
) -> Result<Response, ApiError> {
    if !user.is_staff {
        return Ok(redirect_with_flash("/", FlashMessage::error(CREATE_DENIED)));
    }
    render_form(&state, &page, &PostForm::default(), &FieldErrors::new(), None).await
}

/// POST /crear - Create a post
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    mut page: PageRequest,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    if !user.is_staff {
        tracing::warn!(user = %user.username, "Non-staff user tried to create a post");
        return Ok(redirect_with_flash("/", FlashMessage::error(CREATE_DENIED)));
    }

    let mut form = read_post_form(multipart).await?;
    let errors = match form.validate() {
        Ok(submission) => match state.post_service.create(&user, submission).await {
            Ok(post) => {
                return Ok(redirect_with_flash(
                    &format!("/post/{}", post.id),
                    FlashMessage::success("Publicación creada con éxito."),
                ))
            }
            Err(PostServiceError::Forbidden) => {
                return Ok(redirect_with_flash("/", FlashMessage::error(CREATE_DENIED)))
            }
            Err(e) => submission_errors(e, "crear")?,
        },
        Err(errors) => errors,
    };

    page.push_message(FlashMessage::error(FORM_HAS_ERRORS));
    render_form(&state, &page, &form, &errors, None).await
}

/// GET /editar/{id} - Pre-filled post form
pub async fn edit_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    page: PageRequest,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    if let Err(e) = state.post_service.editable(id, &user).await {
        return forbidden_redirect(e, EDIT_DENIED);
    }
    let detail = state.post_service.get_detail(id, Some(&user)).await?;
    let form = PostForm::from_detail(&detail);
    render_form(&state, &page, &form, &FieldErrors::new(), Some(&detail)).await
}

/// POST /editar/{id} - Update a post
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    mut page: PageRequest,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    if let Err(e) = state.post_service.editable(id, &user).await {
        return forbidden_redirect(e, EDIT_DENIED);
    }

    let mut form = read_post_form(multipart).await?;
    let errors = match form.validate() {
        Ok(submission) => match state.post_service.update(id, &user, submission).await {
            Ok(post) => {
                return Ok(redirect_with_flash(
                    &format!("/post/{}", post.id),
                    FlashMessage::success("Publicación actualizada correctamente."),
                ))
            }
            Err(PostServiceError::Forbidden) => {
                return Ok(redirect_with_flash("/", FlashMessage::error(EDIT_DENIED)))
            }
            Err(e) => submission_errors(e, "actualizar")?,
        },
        Err(errors) => errors,
    };

    let detail = state.post_service.get_detail(id, Some(&user)).await?;
    page.push_message(FlashMessage::error(FORM_HAS_ERRORS));
    render_form(&state, &page, &form, &errors, Some(&detail)).await
}

/// GET /post/{id}/eliminar - Ask before deleting
pub async fn confirm_delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    page: PageRequest,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    if let Err(e) = state.post_service.editable(id, &user).await {
        return forbidden_redirect(e, DELETE_DENIED);
    }
    let detail = state.post_service.get_detail(id, Some(&user)).await?;

    let mut context = TeraContext::new();
    context.insert("post", &detail);
    page.render(&state, "post_confirm_delete.html", &mut context)
}

/// POST /post/{id}/eliminar - Delete a post
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    match state.post_service.delete(id, &user).await {
        Ok(()) => Ok(redirect_with_flash(
            "/",
            FlashMessage::success("Publicación eliminada correctamente."),
        )),
        Err(e) => forbidden_redirect(e, DELETE_DENIED),
    }
}

/// GET /perfil - Every post of the current user
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    page: PageRequest,
) -> Result<Response, ApiError> {
    let posts = state.post_service.by_author(user.id).await?;
    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    context.insert("profile_user", &crate::theme::CurrentUser::from(&user));
    page.render(&state, "profile.html", &mut context)
}
