//! Login and registration forms

use super::{max_length, required, FieldErrors};
use crate::models::CreateUserInput;
use serde::Deserialize;

/// Column limit of `users.username`
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Shortest accepted password
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const INVALID_USERNAME: &str = "Introduzca un nombre de usuario válido. Este valor puede contener solo letras, números y los caracteres @/./+/-/_.";
pub const INVALID_EMAIL: &str = "Introduzca una dirección de correo electrónico válida.";
pub const PASSWORD_MISMATCH: &str = "Los dos campos de contraseña no coinciden.";
pub const PASSWORD_TOO_SHORT: &str =
    "La contraseña es demasiado corta. Debe contener al menos 8 caracteres.";
pub const PASSWORD_NUMERIC: &str = "La contraseña es completamente numérica.";
pub const PASSWORD_SIMILAR: &str = "La contraseña es demasiado similar al nombre de usuario.";
pub const USERNAME_TAKEN: &str = "Ya existe un usuario con este nombre.";
pub const INVALID_LOGIN: &str =
    "Por favor, introduzca un nombre de usuario y clave correctos. Observe que ambos campos pueden ser sensibles a mayúsculas.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Where to go after logging in
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    /// Username and password, both present
    pub fn validate(&self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = required(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.add("password", super::REQUIRED);
        }
        errors.into_result((username, self.password.clone()))
    }

    /// The `next` target if it is a local path, otherwise the home page
    pub fn redirect_target(&self) -> String {
        safe_next(self.next.as_deref())
    }
}

/// Keep redirects on this site
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<CreateUserInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = required(&mut errors, "username", &self.username);
        if !username.is_empty() {
            max_length(&mut errors, "username", &username, MAX_USERNAME_LENGTH);
            if !is_valid_username(&username) {
                errors.add("username", INVALID_USERNAME);
            }
        }

        let email = required(&mut errors, "email", &self.email);
        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", INVALID_EMAIL);
        }

        if self.password1.is_empty() {
            errors.add("password1", super::REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", super::REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        } else {
            for message in password_problems(&self.password2, &username) {
                errors.add("password2", message);
            }
        }

        errors.into_result(CreateUserInput {
            username,
            email,
            password: self.password1.clone(),
        })
    }
}

/// Letters, digits and `@ . + - _`
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Loose shape check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

fn password_problems(password: &str, username: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(PASSWORD_TOO_SHORT);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(PASSWORD_NUMERIC);
    }
    if !username.is_empty() && password.to_lowercase().contains(&username.to_lowercase()) {
        problems.push(PASSWORD_SIMILAR);
    }
    problems
}
