//! HTML form handling
//!
//! Each form is a plain struct filled from the request body. `validate()`
//! returns the typed value the services expect, or a [`FieldErrors`] map the
//! template renders next to each field.

pub mod auth;
pub mod comment;
pub mod post;

pub use auth::{LoginForm, RegisterForm};
pub use comment::CommentForm;
pub use post::PostForm;

use serde::Serialize;
use std::collections::BTreeMap;

/// Message for a missing required field
pub const REQUIRED: &str = "Este campo es obligatorio.";

/// Validation messages keyed by field name.
///
/// Errors that are not tied to one field go under [`FieldErrors::FORM`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Key for form-wide errors
    pub const FORM: &'static str = "__all__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// Single-error map, handy for service failures
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    /// `Ok(value)` when no error was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Check a required text field, returning its trimmed value
pub(crate) fn required(errors: &mut FieldErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value.to_string()
}

/// Check a maximum length in characters
pub(crate) fn max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(
            field,
            format!(
                "Asegúrese de que este valor tenga como máximo {} caracteres (tiene {}).",
                max, len
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collects_per_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.is_empty());
        errors.add("title", REQUIRED);
        errors.add("title", "otro");
        errors.add(FieldErrors::FORM, "general");

        assert_eq!(errors.get("title").len(), 2);
        assert!(errors.has(FieldErrors::FORM));
        assert!(errors.get("content").is_empty());
        assert!(errors.clone().into_result(()).is_err());
    }

    #[test]
    fn test_field_errors_serialize_as_map() {
        let errors = FieldErrors::single("email", "mal");
        let value = serde_json::to_value(&errors).expect("serialize");
        assert_eq!(value["email"][0], "mal");
    }

    #[test]
    fn test_required_and_max_length() {
        let mut errors = FieldErrors::new();
        assert_eq!(required(&mut errors, "title", "  hola "), "hola");
        assert!(errors.is_empty());
        required(&mut errors, "title", "   ");
        max_length(&mut errors, "name", "ñandú", 4);
        assert!(errors.has("title"));
        assert_eq!(
            errors.get("name"),
            ["Asegúrese de que este valor tenga como máximo 4 caracteres (tiene 5)."]
        );
    }
}
