//! Web middleware and shared request types
//!
//! Contains:
//! - `AppState`, the services every handler can reach
//! - Session authentication (`session` cookie or `Authorization: Bearer`)
//! - Extractors for the optional and the required current user
//! - `ApiError` and the middleware that renders it as a themed HTML page

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::api::flash::{redirect, FlashMessage};
use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxPostRepository, SqlxSessionRepository,
    SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CategoryService, CategoryServiceError, CommentService, CommentServiceError, MediaStore,
    PostService, PostServiceError, TagService, TagServiceError, UserService, UserServiceError,
};
use crate::theme::{simple_error_page, StandardTemplateVars, ThemeEngine};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub media: Arc<MediaStore>,
}

impl AppState {
    /// Wire repositories, cache, media store and theme into services
    pub fn build(config: Config, pool: DynDatabasePool) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let media = Arc::new(MediaStore::new(config.upload.clone()));
        let theme_engine = ThemeEngine::new(&config.theme, &config.upload.url_prefix)?;

        let tag_service = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());

        let post_service = PostService::new(
            post_repo.clone(),
            category_repo.clone(),
            tag_service.clone(),
            media.clone(),
        );
        let comment_service =
            CommentService::new(SqlxCommentRepository::boxed(pool.clone()), post_repo);
        let category_service = CategoryService::new(category_repo, cache);
        let user_service = UserService::with_session_days(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            config.site.session_days,
        );

        Ok(Self {
            config: Arc::new(config),
            user_service: Arc::new(user_service),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(comment_service),
            category_service: Arc::new(category_service),
            tag_service,
            theme_engine: Arc::new(theme_engine),
            media,
        })
    }
}

/// Authenticated user stored in request extensions by [`optional_auth`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

/// The signed-in user; anonymous requests are sent to the login page
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(auth) => Ok(Self(auth.user.clone())),
            None => Err(login_redirect(parts)),
        }
    }
}

/// Redirect to the login page, coming back to the current URL afterwards
pub fn login_redirect(parts: &Parts) -> Response {
    let next = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    redirect(&format!("/login?next={}", urlencoding::encode(next)))
}

/// Extract session token from request
pub fn extract_session_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    read_cookie(parts, "session")
}

/// Value of a cookie by name
pub fn read_cookie(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Attach the session's user to the request when the token is valid.
/// Invalid or expired tokens are treated as anonymous.
pub async fn optional_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    if let Some(token) = extract_session_token(&parts) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                parts.extensions.insert(AuthenticatedUser { user, token });
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Session validation failed"),
        }
    }
    next.run(Request::from_parts(parts, body)).await
}

/// Error raised by handlers; rendered as an HTML error page
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Internal detail, only shown when the site runs in debug mode
    #[serde(skip)]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error(detail: impl std::fmt::Display) -> Self {
        let detail = detail.to_string();
        tracing::error!(error = %detail, "Request failed");
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: "Ocurrió un error inesperado.".to_string(),
            detail: Some(detail),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "Página no encontrada",
            StatusCode::FORBIDDEN => "Acceso denegado",
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => "Solicitud inválida",
            _ => "Error del servidor",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Html(simple_error_page(self.title(), &self.message))).into_response();
        // Picked up by `render_error_pages` to render the themed page
        response.extensions_mut().insert(self);
        response
    }
}

/// Replace the plain error body of an [`ApiError`] response with the
/// theme's `error.html`
pub async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|auth| auth.user.clone());
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let Some(error) = response.extensions_mut().remove::<ApiError>() else {
        return response;
    };

    let site = &state.config.site;
    let mut context = TeraContext::new();
    context.insert("status", &error.status().as_u16());
    context.insert("error_title", error.title());
    context.insert("error_message", &error.message);
    context.insert(
        "error_detail",
        &error.detail.as_deref().filter(|_| site.debug),
    );
    context.insert("messages", &Vec::<FlashMessage>::new());

    let vars = StandardTemplateVars::new(&site.name, &site.language, path).with_user(user.as_ref());
    let html = match state
        .theme_engine
        .render_with_standard_vars("error.html", &context, &vars)
    {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render error page");
            simple_error_page(error.title(), &error.message)
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, axum::body::Body::from(html))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found("La página que buscás no existe.")
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(_) => Self::not_found("La publicación no existe."),
            PostServiceError::Forbidden => Self::forbidden("No tenés permisos para esta acción."),
            PostServiceError::InvalidCategory(_) | PostServiceError::InvalidImage(_) => {
                Self::bad_request(e.to_string())
            }
            PostServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::PostNotFound(_) => Self::not_found("La publicación no existe."),
            CommentServiceError::ValidationError(msg) => Self::bad_request(msg),
            CommentServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(_) => Self::not_found("La categoría no existe."),
            CategoryServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(e: TagServiceError) -> Self {
        match e {
            TagServiceError::NotFound(_) => Self::not_found("La etiqueta no existe."),
            TagServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InvalidCredentials | UserServiceError::UsernameTaken(_) => {
                Self::bad_request(e.to_string())
            }
            UserServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts_with(header_name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = HttpRequest::builder()
            .uri("/crear?x=1")
            .header(header_name, value)
            .body(())
            .expect("request")
            .into_parts();
        parts
    }

    #[test]
    fn test_session_token_from_cookie_or_bearer() {
        let parts = parts_with(header::COOKIE, "flash=abc; session=tok-123");
        assert_eq!(extract_session_token(&parts).as_deref(), Some("tok-123"));

        let parts = parts_with(header::AUTHORIZATION, "Bearer tok-456");
        assert_eq!(extract_session_token(&parts).as_deref(), Some("tok-456"));

        let parts = parts_with(header::COOKIE, "session=");
        assert!(extract_session_token(&parts).is_none());
    }

    #[test]
    fn test_login_redirect_keeps_next() {
        let parts = parts_with(header::COOKIE, "");
        let response = login_redirect(&parts);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some("/login?next=%2Fcrear%3Fx%3D1")
        );
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        let internal = ApiError::internal_error("db down");
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.detail.as_deref(), Some("db down"));

        let error: ApiError = PostServiceError::Forbidden.into();
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
    }
}
