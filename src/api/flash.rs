//! One-shot flash messages
//!
//! A handler that redirects can leave messages for the next page. They
//! travel in the `flash` cookie as URL-encoded JSON; the next rendered page
//! shows them and clears the cookie.

use axum::{
    http::{header, request::Parts, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::read_cookie;

/// Name of the cookie carrying pending messages
pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: FlashLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(FlashLevel::Error, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, text)
    }
}

/// Messages waiting in the request's flash cookie. A cookie that does not
/// decode is treated as empty.
pub fn take_messages(parts: &Parts) -> Vec<FlashMessage> {
    read_cookie(parts, FLASH_COOKIE)
        .and_then(|raw| urlencoding::decode(&raw).ok().map(|s| s.into_owned()))
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

/// `Set-Cookie` value storing `messages`
pub fn flash_cookie(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(&json)
    )
}

/// `Set-Cookie` value removing the flash cookie
pub fn clear_flash_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", FLASH_COOKIE)
}

/// Append a `Set-Cookie` header
pub fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "Dropping invalid cookie"),
    }
}

/// 303 redirect to `to`
pub fn redirect(to: &str) -> Response {
    axum::response::Redirect::to(to).into_response()
}

/// 303 redirect that shows `message` on the next page
pub fn redirect_with_flash(to: &str, message: FlashMessage) -> Response {
    let mut response = redirect(to);
    append_cookie(&mut response, &flash_cookie(&[message]));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    #[test]
    fn test_cookie_round_trip() {
        let messages = vec![
            FlashMessage::success("Publicación creada con éxito."),
            FlashMessage::error("No tenés permisos; probá de nuevo"),
        ];
        let cookie = flash_cookie(&messages);
        let value = cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string();
        assert!(!value.contains(' '));

        let (parts, _) = Request::builder()
            .header(header::COOKIE, format!("session=abc; {}", value))
            .body(())
            .expect("request")
            .into_parts();
        assert_eq!(take_messages(&parts), messages);
    }

    #[test]
    fn test_garbage_cookie_is_ignored() {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, "flash=%7Bnot-json")
            .body(())
            .expect("request")
            .into_parts();
        assert!(take_messages(&parts).is_empty());
    }

    #[test]
    fn test_redirect_with_flash() {
        let response = redirect_with_flash("/", FlashMessage::info("hola"));
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some("/")
        );
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie");
        assert!(cookie.starts_with("flash="));
    }
}
