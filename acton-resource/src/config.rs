//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `ACTON_`, nesting separator: `__`,
//!    e.g. `ACTON_DATABASE__HOST`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/acton-resource/{service_name}/config.toml
//! 4. System directory: /etc/acton-resource/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const CONFIG_PREFIX: &str = "acton-resource";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Database configuration (optional)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Token verification configuration (optional)
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, reported by the health route
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable, multi-line
    Pretty,
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database name
    pub name: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// User name
    pub username: String,

    /// Password
    pub password: String,

    /// Maximum open connections in the pool
    pub max_open_conns: u32,

    /// Connections kept open while idle
    pub max_idle_conns: u32,

    /// Connection acquire timeout in seconds
    pub connection_timeout_secs: u64,

    /// Connection retries at startup
    pub max_retries: u32,

    /// Base delay between retries in seconds (doubles each attempt)
    pub retry_delay_secs: u64,

    /// `disable`, `prefer`, `require`, `verify-ca` or `verify-full`
    pub ssl_mode: String,

    /// Migrations applied at startup when set
    pub migrations_dir: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            max_open_conns: 25,
            max_idle_conns: 5,
            connection_timeout_secs: 10,
            max_retries: 3,
            retry_delay_secs: 2,
            ssl_mode: "disable".to_string(),
            migrations_dir: None,
        }
    }
}

/// Token verification configuration
///
/// Keys come from `jwks_url` when set, otherwise from `public_key_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer base URL; keys are read from `{jwks_url}/.well-known/jwks.json`
    pub jwks_url: Option<String>,

    /// PEM key file (public key for RS*/ES*, shared secret for HS*)
    pub public_key_path: Option<PathBuf>,

    /// Algorithm used with `public_key_path`
    pub algorithm: String,

    /// Expected `iss`
    pub issuer: Option<String>,

    /// Expected `aud`
    pub audience: Option<String>,

    /// Prefix of the custom claims
    pub claims_namespace: String,

    /// Maximum age of the cached key set in seconds
    pub jwks_refresh_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_url: None,
            public_key_path: None,
            algorithm: "RS256".to_string(),
            issuer: None,
            audience: None,
            claims_namespace: "https://hear.com".to_string(),
            jwks_refresh_secs: 3600,
        }
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Maximum request body size in megabytes
    pub body_limit_mb: usize,

    /// `permissive`, `restrictive` or `disabled`
    pub cors_mode: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: 10,
            cors_mode: "permissive".to_string(),
        }
    }
}

// Default value functions
fn default_service_name() -> String {
    CONFIG_PREFIX.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is inferred from the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment.merge(Self::env()).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed("ACTON_").split("__")
    }

    /// Candidate config files, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file(Path::new(service_name).join("config.toml")) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}
