//! Page rendering helpers

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::flash::{
    append_cookie, clear_flash_cookie, take_messages, FlashMessage, FLASH_COOKIE,
};
use crate::api::middleware::{read_cookie, ApiError, AppState, AuthenticatedUser};
use crate::models::User;
use crate::theme::StandardTemplateVars;

/// Per-request data every page needs: the current user, pending flash
/// messages and the request path.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub user: Option<User>,
    pub messages: Vec<FlashMessage>,
    pub path: String,
    had_flash_cookie: bool,
}

impl<S> FromRequestParts<S> for PageRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            user: parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|auth| auth.user.clone()),
            had_flash_cookie: read_cookie(parts, FLASH_COOKIE).is_some(),
            messages: take_messages(parts),
            path: parts.uri.path().to_string(),
        })
    }
}

impl PageRequest {
    /// Show a message on the page being rendered
    pub fn push_message(&mut self, message: FlashMessage) {
        self.messages.push(message);
    }

    /// Render a theme template with the standard variables and the
    /// pending messages, consuming the flash cookie.
    pub fn render(
        &self,
        state: &AppState,
        template: &str,
        context: &mut TeraContext,
    ) -> Result<Response, ApiError> {
        let site = &state.config.site;
        context.insert("messages", &self.messages);
        let vars = StandardTemplateVars::new(&site.name, &site.language, self.path.clone())
            .with_user(self.user.as_ref());

        let html = state
            .theme_engine
            .render_with_standard_vars(template, context, &vars)
            .map_err(|e| ApiError::internal_error(format!("Failed to render {}: {}", template, e)))?;

        let mut response = Html(html).into_response();
        if self.had_flash_cookie {
            append_cookie(&mut response, &clear_flash_cookie());
        }
        Ok(response)
    }
}
