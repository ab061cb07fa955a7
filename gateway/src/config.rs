//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: GATEWAY_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/handler-gateway/{service_name}/config.toml
//! 4. System directory: /etc/handler-gateway/{service_name}/config.toml
//! 5. Default values
//!
//! ```toml
//! [service]
//! name = "users"
//! port = 9000
//!
//! [response]
//! version = "v2"
//!
//! [language]
//! default_language = "fa"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::handlers::{DEFAULT_TIMESTAMP_FORMAT, DEFAULT_VERSION};

const APP_DIR: &str = "handler-gateway";
const ENV_PREFIX: &str = "GATEWAY_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Response envelope configuration
    #[serde(default)]
    pub response: ResponseConfig,

    /// Localization configuration
    #[serde(default)]
    pub language: LanguageConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Origin allowed by CORS; any origin when unset
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,

    /// CORS mode: permissive, restrictive or disabled
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

/// Response envelope configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Version stamped on every envelope
    #[serde(default = "default_version")]
    pub version: String,

    /// `strftime` format of `represented_at`
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

/// Localization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language used when `Accept-Language` matches nothing
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
        }
    }
}

/// How cross-origin requests are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsMode {
    Permissive,
    Restrictive,
    Disabled,
}

impl ServiceConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }

    /// Parsed CORS mode
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown modes.
    pub fn cors(&self) -> Result<CorsMode> {
        match self.cors_mode.to_ascii_lowercase().as_str() {
            "permissive" => Ok(CorsMode::Permissive),
            "restrictive" => Ok(CorsMode::Restrictive),
            "disabled" => Ok(CorsMode::Disabled),
            other => Err(Error::InvalidConfig(format!("unknown cors_mode '{other}'"))),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Config {
    /// Load configuration, naming the service after the running binary
    ///
    /// # Errors
    ///
    /// Fails when a config source cannot be parsed.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| APP_DIR.to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    ///
    /// # Errors
    ///
    /// Fails when a config source cannot be parsed.
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        let mut defaults = Config::default();
        defaults.service.name = service_name.to_string();
        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        // lowest priority first, so later files override earlier ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!(path = %path.display(), "loading configuration");
                figment = figment.merge(Toml::file(path));
            } else {
                tracing::debug!(path = %path.display(), "config file not found");
            }
        }

        Ok(figment.merge(Self::env()).extract()?)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the XDG and system directories. Environment variables still
    /// override the file.
    ///
    /// # Errors
    ///
    /// Fails when the file or the environment cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// Candidate config files, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_DIR);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(APP_DIR)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Recommended location of a service's config file
    ///
    /// Returns: ~/.config/handler-gateway/{service_name}/config.toml
    pub fn recommended_path(service_name: &str) -> Option<PathBuf> {
        let config_home = xdg::BaseDirectories::with_prefix(APP_DIR).get_config_home()?;
        Some(config_home.join(service_name).join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: APP_DIR.to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                body_limit_mb: default_body_limit_mb(),
                cors_allowed_origin: None,
                cors_mode: default_cors_mode(),
            },
            response: ResponseConfig::default(),
            language: LanguageConfig::default(),
        }
    }
}
