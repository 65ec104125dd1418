//! Login, logout and registration pages
//!
//! Sessions are carried in the `session` cookie (HttpOnly, SameSite=Lax).

use axum::{
    extract::{Query, Request, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::flash::{append_cookie, redirect, redirect_with_flash, FlashMessage};
use crate::api::middleware::{extract_session_token, ApiError, AppState};
use crate::api::render::PageRequest;
use crate::forms::auth::{INVALID_LOGIN, USERNAME_TAKEN};
use crate::forms::{FieldErrors, LoginForm, RegisterForm};
use crate::models::Session;
use crate::services::UserServiceError;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// `Set-Cookie` value for a new session
pub fn session_cookie(session: &Session, days: i64) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        days.max(0) * 24 * 60 * 60
    )
}

/// `Set-Cookie` value removing the session
pub fn clear_session_cookie() -> &'static str {
    "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
}

fn render_login(
    state: &AppState,
    page: &PageRequest,
    username: &str,
    next: &str,
    errors: &FieldErrors,
) -> Result<Response, ApiError> {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("next", next);
    context.insert("errors", errors);
    page.render(state, "login.html", &mut context)
}

fn render_register(
    state: &AppState,
    page: &PageRequest,
    form: &RegisterForm,
    errors: &FieldErrors,
) -> Result<Response, ApiError> {
    let mut context = TeraContext::new();
    context.insert("username", &form.username);
    context.insert("email", &form.email);
    context.insert("errors", errors);
    page.render(state, "register.html", &mut context)
}

/// GET /login
pub async fn login_form(
    State(state): State<AppState>,
    page: PageRequest,
    Query(query): Query<NextQuery>,
) -> Result<Response, ApiError> {
    let next = query.next.unwrap_or_default();
    render_login(&state, &page, "", &next, &FieldErrors::new())
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    page: PageRequest,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let next = form.next.clone().unwrap_or_default();
    let (username, password) = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return render_login(&state, &page, &form.username, &next, &errors),
    };

    match state.user_service.login(&username, &password).await {
        Ok((_, session)) => {
            let mut response = redirect(&form.redirect_target());
            append_cookie(
                &mut response,
                &session_cookie(&session, state.config.site.session_days),
            );
            Ok(response)
        }
        Err(UserServiceError::InvalidCredentials) => {
            let errors = FieldErrors::single(FieldErrors::FORM, INVALID_LOGIN);
            render_login(&state, &page, &username, &next, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, _) = request.into_parts();
    if let Some(token) = extract_session_token(&parts) {
        state.user_service.logout(&token).await?;
    }
    let mut response = redirect("/");
    append_cookie(&mut response, clear_session_cookie());
    Ok(response)
}

/// GET /registro
pub async fn register_form(
    State(state): State<AppState>,
    page: PageRequest,
) -> Result<Response, ApiError> {
    render_register(&state, &page, &RegisterForm::default(), &FieldErrors::new())
}

/// POST /registro - Create the account and sign it in
pub async fn register(
    State(state): State<AppState>,
    page: PageRequest,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return render_register(&state, &page, &form, &errors),
    };

    let user = match state.user_service.register(input).await {
        Ok(user) => user,
        Err(UserServiceError::UsernameTaken(_)) => {
            let errors = FieldErrors::single("username", USERNAME_TAKEN);
            return render_register(&state, &page, &form, &errors);
        }
        Err(e) => return Err(e.into()),
    };

    let session = state.user_service.start_session(&user).await?;
    let mut response = redirect_with_flash("/", FlashMessage::success("Registro exitoso. ¡Bienvenido!"));
    append_cookie(
        &mut response,
        &session_cookie(&session, state.config.site.session_days),
    );
    Ok(response)
}
