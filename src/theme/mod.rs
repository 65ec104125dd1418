//! Theme engine
//!
//! This module provides template rendering using Tera.
//! Features:
//! - The default theme is embedded in the binary
//! - A theme directory on disk overrides embedded templates by name, so a
//!   custom theme only needs the pages it changes
//! - Standard template variables shared by every page
//! - A built-in error page when even `error.html` fails to render

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera, Value};

use crate::config::ThemeConfig;
use crate::models::User;

mod error;

pub use error::ThemeError;

/// Name of the embedded theme
pub const DEFAULT_THEME: &str = "default";

#[derive(RustEmbed)]
#[folder = "themes/default/"]
#[include = "*.html"]
struct EmbeddedTheme;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Theme the templates were loaded from
    current_theme: String,
}

impl ThemeEngine {
    /// Load the configured theme on top of the embedded default theme.
    ///
    /// A missing theme directory is not an error: the embedded templates
    /// are used and a warning is logged.
    pub fn new(config: &ThemeConfig, media_prefix: &str) -> Result<Self> {
        let mut templates = embedded_templates()?;

        let theme_path = config.path.join(&config.active);
        let current_theme = if theme_path.is_dir() {
            let mut overrides = BTreeMap::new();
            collect_templates_from_dir(&theme_path, &theme_path, &mut overrides)?;
            tracing::info!(
                theme = %config.active,
                templates = overrides.len(),
                "Loaded theme from {:?}",
                theme_path
            );
            templates.extend(overrides);
            config.active.clone()
        } else {
            if config.active != DEFAULT_THEME {
                tracing::warn!(
                    theme = %config.active,
                    "Theme directory {:?} not found, using the embedded default theme",
                    theme_path
                );
            }
            DEFAULT_THEME.to_string()
        };

        let tera = build_tera(templates, media_prefix)?;
        Ok(Self { tera, current_theme })
    }

    /// Engine with only the embedded default theme
    pub fn embedded(media_prefix: &str) -> Result<Self> {
        let tera = build_tera(embedded_templates()?, media_prefix)?;
        Ok(Self {
            tera,
            current_theme: DEFAULT_THEME.to_string(),
        })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, ThemeError> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg)
        })
    }

    /// Render a template with the standard variables added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String, ThemeError> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("language", &standard_vars.language);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("theme_name", &self.current_theme);
        full_context.insert("year", &standard_vars.year);
        full_context.insert("current_user", &standard_vars.current_user);

        self.render(template, &full_context)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Get the current theme name
    pub fn current_theme(&self) -> &str {
        &self.current_theme
    }
}

/// A self-contained HTML error page that needs no templates
pub fn simple_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 600px;
            margin: 50px auto;
            padding: 20px;
            background: #f5f5f5;
        }}
        .error-box {{
            background: white;
            border-left: 4px solid #e74c3c;
            padding: 20px;
            border-radius: 4px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }}
        h1 {{ color: #e74c3c; margin-top: 0; }}
    </style>
</head>
<body>
    <div class="error-box">
        <h1>{title}</h1>
        <p>{message}</p>
        <p><a href="/">Volver al inicio</a></p>
    </div>
</body>
</html>"#,
        title = escape_html(title),
        message = escape_html(message),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn embedded_templates() -> Result<BTreeMap<String, String>> {
    let mut templates = BTreeMap::new();
    for name in EmbeddedTheme::iter() {
        let file = EmbeddedTheme::get(&name)
            .ok_or_else(|| ThemeError::NotFound(format!("embedded template {}", name)))?;
        let content = String::from_utf8(file.data.into_owned())
            .with_context(|| format!("Embedded template {} is not UTF-8", name))?;
        templates.insert(name.to_string(), content);
    }
    Ok(templates)
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::from)? {
        let path = entry.map_err(ThemeError::from)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.insert(template_name, content);
        }
    }
    Ok(())
}

fn build_tera(templates: BTreeMap<String, String>, media_prefix: &str) -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(templates)
        .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", e)))?;

    let prefix = media_prefix.trim_end_matches('/').to_string();
    tera.register_filter(
        "media",
        move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
            match value {
                Value::String(path) if !path.is_empty() => Ok(Value::String(format!(
                    "{}/{}",
                    prefix,
                    path.trim_start_matches('/')
                ))),
                _ => Ok(Value::String(String::new())),
            }
        },
    );
    Ok(tera)
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    /// Blog name
    pub site_name: String,
    /// `lang` attribute of the page
    pub language: String,
    /// Current logged-in user (optional)
    pub current_user: Option<CurrentUser>,
    /// Current request path
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

impl StandardTemplateVars {
    pub fn new(
        site_name: impl Into<String>,
        language: impl Into<String>,
        request_path: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            language: language.into(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}


#[cfg(test)]
mod tests;
