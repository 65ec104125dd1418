//! Configuration management
//!
//! Configuration is read once at start-up from `config.yml` and then
//! overridden by `BITACORA_*` environment variables. Missing values fall back
//! to defaults, so an absent or empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/bitacora.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_entries() -> u64 {
    1_000
}

/// Theme configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Active theme name
    #[serde(default = "default_theme")]
    pub active: String,
    /// Path to themes directory
    #[serde(default = "default_theme_path")]
    pub path: PathBuf,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            active: default_theme(),
            path: default_theme_path(),
        }
    }
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_theme_path() -> PathBuf {
    PathBuf::from("themes")
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory uploaded media is written to
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix media is served under
    #[serde(default = "default_upload_url_prefix")]
    pub url_prefix: String,
    /// Maximum size of a single file in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum size of a whole request body in bytes (default: 50MB)
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u64,
    /// MIME types accepted for the main post image
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            url_prefix: default_upload_url_prefix(),
            max_file_size: default_max_file_size(),
            max_request_size: default_max_request_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_upload_url_prefix() -> String {
    "/media".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_request_size() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed for the main image
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            "image/x-icon" => "ico",
            _ => "bin",
        }
    }
}

/// Site-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Name shown in page titles and the header
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Value of the `lang` attribute on rendered pages
    #[serde(default = "default_language")]
    pub language: String,
    /// Show error details on error pages
    #[serde(default)]
    pub debug: bool,
    /// Categories created on first start when the table is empty
    #[serde(default = "default_categories")]
    pub default_categories: Vec<String>,
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            language: default_language(),
            debug: false,
            default_categories: default_categories(),
            session_days: default_session_days(),
        }
    }
}

fn default_site_name() -> String {
    "Bitácora".to_string()
}

fn default_language() -> String {
    "es-AR".to_string()
}

fn default_categories() -> Vec<String> {
    vec![
        "Noticias".to_string(),
        "Reseñas".to_string(),
        "Guías".to_string(),
    ]
}

fn default_session_days() -> i64 {
    7
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// First path segments taken by page routes
const RESERVED_PATHS: &[&str] = &[
    "post", "crear", "editar", "perfil", "categoria", "tags", "login", "logout", "registro",
];

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Malformed
    /// YAML is an error carrying the line and column of the problem.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate
    ///
    /// Recognised variables:
    /// - BITACORA_SERVER_HOST
    /// - BITACORA_SERVER_PORT
    /// - BITACORA_DATABASE_DRIVER
    /// - BITACORA_DATABASE_URL
    /// - BITACORA_CACHE_TTL_SECONDS
    /// - BITACORA_THEME_ACTIVE
    /// - BITACORA_THEME_PATH
    /// - BITACORA_UPLOAD_PATH
    /// - BITACORA_SITE_NAME
    /// - BITACORA_SITE_DEBUG
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url cannot be empty".to_string(),
            ));
        }
        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size must be greater than 0".to_string(),
            ));
        }
        let prefix = self.upload.url_prefix.trim_matches('/');
        if prefix.is_empty() || prefix.contains(['{', '}', '*']) {
            return Err(ConfigError::ValidationError(format!(
                "upload.url_prefix must be a non-root path, got '{}'",
                self.upload.url_prefix
            )));
        }
        let first_segment = prefix.split('/').next().unwrap_or(prefix);
        if RESERVED_PATHS.contains(&first_segment) {
            return Err(ConfigError::ValidationError(format!(
                "upload.url_prefix '{}' collides with a page route",
                self.upload.url_prefix
            )));
        }
        if self.site.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "site.session_days must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BITACORA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BITACORA_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("BITACORA_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("BITACORA_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("BITACORA_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(active) = std::env::var("BITACORA_THEME_ACTIVE") {
            self.theme.active = active;
        }
        if let Ok(path) = std::env::var("BITACORA_THEME_PATH") {
            self.theme.path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("BITACORA_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("BITACORA_SITE_NAME") {
            self.site.name = name;
        }
        if let Ok(debug) = std::env::var("BITACORA_SITE_DEBUG") {
            match debug.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.site.debug = true,
                "0" | "false" | "no" => self.site.debug = false,
                _ => {}
            }
        }
    }
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Tests that touch the process environment serialize on this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_port_round_trips_through_yaml(port in 1u16..=u16::MAX) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", port).unwrap();

            let config = Config::load(file.path()).unwrap();
            prop_assert_eq!(config.server.port, port);
            prop_assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        }

        #[test]
        fn prop_site_name_preserved(name in "[A-Za-z][A-Za-z ]{0,30}") {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "site:\n  name: \"{}\"\n", name).unwrap();

            let config = Config::load(file.path()).unwrap();
            prop_assert_eq!(config.site.name, name);
        }
    }
}
