//! Comment form

use super::{required, FieldErrors};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

impl CommentForm {
    /// Trimmed comment text
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let content = required(&mut errors, "content", &self.content);
        errors.into_result(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_validation() {
        let form = CommentForm {
            content: "  ¡Buena reseña!  ".to_string(),
        };
        assert_eq!(form.validate().expect("valid"), "¡Buena reseña!");

        let blank = CommentForm {
            content: "\n\t ".to_string(),
        };
        assert!(blank.validate().expect_err("blank").has("content"));
    }
}
