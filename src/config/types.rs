// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Application kernel descriptors. The key must be present: a server
    /// with no kernels configured is a startup error.
    pub kernels: Vec<KernelConfig>,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

/// Static asset configuration
///
/// When `web_root` is unset, startup discovery is skipped entirely and no
/// asset routes are bound.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AssetsConfig {
    #[serde(default)]
    pub web_root: Option<String>,
}

/// One application kernel descriptor
#[derive(Debug, Deserialize, Clone)]
pub struct KernelConfig {
    /// URL prefix the kernel's application handler is bound to.
    pub path: String,
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Free-form kernel parameters exposed through the kernel's
    /// named-parameter lookup.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_environment() -> String {
    "prod".to_string()
}
