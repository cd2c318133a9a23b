//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables (or a `.env` file)
//! with development defaults. Only `JWT_SECRET` is required.
//!
//! # Routes
//!
//! The default service set maps `/api/{service}/**` to `http://localhost:8081`
//! through `http://localhost:8091`. Each service is tuned with
//! `SERVICES_<NAME>_URL`, `SERVICES_<NAME>_PATH_REWRITE` and
//! `SERVICES_<NAME>_TIMEOUT_MS`, where `<NAME>` is the service name upper-cased
//! with `-` replaced by `_`. Further services are added with
//! `EXTRA_SERVICES=name=url,name=url`.
//!
//! # Security Configuration
//!
//! - `JWT_SECRET`: HMAC key for bearer tokens, at least 32 bytes
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated origins or patterns (default: `*`)

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::MIN_SECRET_LEN;
use crate::error::{AppError, AppResult};
use crate::routing::{GATEWAY_SOURCE_HEADER, RewritePolicy, RouteDefinition, RouteTable};

/// Services routed by a stock deployment, with their local development ports.
pub const DEFAULT_SERVICES: [(&str, u16); 11] = [
    ("access", 8081),
    ("audit", 8082),
    ("catalog", 8083),
    ("customers", 8084),
    ("inventory", 8085),
    ("orders", 8086),
    ("pricing", 8087),
    ("recommender", 8088),
    ("sales-dashboard", 8089),
    ("sites", 8090),
    ("chatbot", 8091),
];

/// Default value of the `X-Gateway-Source` header.
pub const DEFAULT_GATEWAY_SOURCE: &str = "shopifake-gateway";

/// Backend service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub url: String,
    pub rewrite: RewritePolicy,
    pub timeout: Duration,
}

/// Cross-origin settings applied outside the authenticated pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Exact origins, `*`-patterns, or a lone `*` to mirror any origin
    pub allowed_origins: Vec<String>,
    /// Method names, or `*` to mirror the preflight request
    pub allowed_methods: Vec<String>,
    /// Header names, or `*` to mirror the preflight request
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected 'text' or 'json')")),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Gateway will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Authentication
    // =========================================================================
    /// HMAC key used to verify bearer tokens
    pub jwt_secret: String,

    // =========================================================================
    // Routing
    // =========================================================================
    /// Backend services, one route each
    pub services: Vec<ServiceConfig>,

    /// Rewrite policy for services without an explicit one (default: strip)
    pub default_rewrite: RewritePolicy,

    /// Deadline for backend response headers (default: 30 seconds)
    pub upstream_timeout: Duration,

    /// TCP connect timeout shared by all backends (default: 5 seconds)
    pub upstream_connect_timeout: Duration,

    /// Value of the `X-Gateway-Source` header added to forwarded requests
    pub gateway_source: String,

    // =========================================================================
    // CORS
    // =========================================================================
    pub cors: CorsConfig,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Log output format (default: text)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `JWT_SECRET` is missing or any value
    /// is malformed.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let default_rewrite = Self::parse_var(&var, "PATH_REWRITE", RewritePolicy::default())?;
        let upstream_timeout =
            Duration::from_millis(Self::parse_var(&var, "UPSTREAM_TIMEOUT_MS", 30_000)?);

        let config = Self {
            // Server
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: Self::parse_var(&var, "PORT", 8080)?,

            // Authentication
            jwt_secret: var("JWT_SECRET")
                .ok_or_else(|| AppError::ConfigError("JWT_SECRET must be set".to_string()))?,

            // Routing
            services: Self::parse_services(&var, default_rewrite, upstream_timeout)?,
            default_rewrite,
            upstream_timeout,
            upstream_connect_timeout: Duration::from_millis(Self::parse_var(
                &var,
                "UPSTREAM_CONNECT_TIMEOUT_MS",
                5_000,
            )?),
            gateway_source: var("GATEWAY_SOURCE")
                .unwrap_or_else(|| DEFAULT_GATEWAY_SOURCE.to_string()),

            // CORS
            cors: CorsConfig {
                allowed_origins: Self::parse_list(var("CORS_ALLOWED_ORIGINS"), "*"),
                allowed_methods: Self::parse_list(
                    var("CORS_ALLOWED_METHODS"),
                    "GET,POST,PUT,PATCH,DELETE,OPTIONS",
                ),
                allowed_headers: Self::parse_list(var("CORS_ALLOWED_HEADERS"), "*"),
                allow_credentials: Self::parse_var(&var, "CORS_ALLOW_CREDENTIALS", false)?,
            },

            // Observability
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: Self::parse_var(&var, "LOG_FORMAT", LogFormat::Text)?,
            metrics_port: Self::parse_var(&var, "METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AppError::ConfigError(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes, got {}",
                self.jwt_secret.len()
            )));
        }

        if self.upstream_connect_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "UPSTREAM_CONNECT_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(AppError::ConfigError(
                "CORS_ALLOWED_ORIGINS must list at least one origin".to_string(),
            ));
        }

        // Route construction checks names, URLs, timeouts and duplicates.
        self.route_table().map(|_| ())
    }

    /// Build the route table, attaching the gateway marker header to every route.
    pub fn route_table(&self) -> AppResult<RouteTable> {
        let definitions = self
            .services
            .iter()
            .map(|service| {
                RouteDefinition::new(&service.name, &service.url, service.rewrite, service.timeout)?
                    .with_header(GATEWAY_SOURCE_HEADER, &self.gateway_source)
            })
            .collect::<AppResult<Vec<_>>>()?;
        RouteTable::new(definitions)
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse a variable into the specified type with a default value.
    fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match var(name) {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }

    /// Split a comma-separated list, dropping blank entries.
    fn parse_list(value: Option<String>, default: &str) -> Vec<String> {
        value
            .as_deref()
            .unwrap_or(default)
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Resolve the default services plus `EXTRA_SERVICES`, applying
    /// per-service overrides.
    fn parse_services(
        var: &impl Fn(&str) -> Option<String>,
        default_rewrite: RewritePolicy,
        default_timeout: Duration,
    ) -> AppResult<Vec<ServiceConfig>> {
        let mut entries: Vec<(String, String)> = DEFAULT_SERVICES
            .iter()
            .map(|(name, port)| (name.to_string(), format!("http://localhost:{port}")))
            .collect();

        if let Some(extra) = var("EXTRA_SERVICES") {
            for entry in extra.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let (name, url) = entry.split_once('=').ok_or_else(|| {
                    AppError::ConfigError(format!(
                        "Invalid EXTRA_SERVICES entry '{entry}': expected name=url"
                    ))
                })?;
                entries.push((name.trim().to_string(), url.trim().to_string()));
            }
        }

        entries
            .into_iter()
            .map(|(name, default_url)| {
                let url = var(&service_var(&name, "URL")).unwrap_or(default_url);
                let rewrite =
                    Self::parse_var(var, &service_var(&name, "PATH_REWRITE"), default_rewrite)?;
                let timeout = Duration::from_millis(Self::parse_var(
                    var,
                    &service_var(&name, "TIMEOUT_MS"),
                    default_timeout.as_millis() as u64,
                )?);
                Ok(ServiceConfig {
                    name,
                    url,
                    rewrite,
                    timeout,
                })
            })
            .collect()
    }
}

/// Variable name for a per-service setting: `SERVICES_<NAME>_<SUFFIX>`.
pub fn service_var(service: &str, suffix: &str) -> String {
    format!(
        "SERVICES_{}_{suffix}",
        service.to_ascii_uppercase().replace('-', "_")
    )
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[redacted]")
            .field("services", &self.services)
            .field("default_rewrite", &self.default_rewrite)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("upstream_connect_timeout", &self.upstream_connect_timeout)
            .field("gateway_source", &self.gateway_source)
            .field("cors", &self.cors)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

/// Default configuration for testing and development.
///
/// `jwt_secret` is empty and must be filled in before the configuration
/// validates. Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        let upstream_timeout = Duration::from_secs(30);
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: String::new(),
            services: DEFAULT_SERVICES
                .iter()
                .map(|(name, port)| ServiceConfig {
                    name: name.to_string(),
                    url: format!("http://localhost:{port}"),
                    rewrite: RewritePolicy::default(),
                    timeout: upstream_timeout,
                })
                .collect(),
            default_rewrite: RewritePolicy::default(),
            upstream_timeout,
            upstream_connect_timeout: Duration::from_secs(5),
            gateway_source: DEFAULT_GATEWAY_SOURCE.to_string(),
            cors: CorsConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "config-test-secret-0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> AppResult<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    fn service<'a>(config: &'a Config, name: &str) -> &'a ServiceConfig {
        config.services.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.services.len(), DEFAULT_SERVICES.len());
        assert_eq!(service(&config, "access").url, "http://localhost:8081");
        assert_eq!(service(&config, "chatbot").url, "http://localhost:8091");
        assert_eq!(service(&config, "orders").rewrite, RewritePolicy::StripPrefix);
        assert_eq!(service(&config, "orders").timeout, Duration::from_secs(30));
        assert_eq!(config.upstream_connect_timeout, Duration::from_secs(5));
        assert_eq!(config.gateway_source, "shopifake-gateway");
        assert_eq!(config.cors, CorsConfig::default());
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.metrics_addr(),
            Some(SocketAddr::from(([0, 0, 0, 0], 9090)))
        );
    }

    #[test]
    fn test_log_settings_from_env() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("RUST_LOG", "shopifake_gateway=debug"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.log_level, "shopifake_gateway=debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_secret_rejected() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = load(&[("JWT_SECRET", "too-short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn test_per_service_overrides() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("SERVICES_SALES_DASHBOARD_URL", "http://dashboard:9000/"),
            ("SERVICES_SALES_DASHBOARD_PATH_REWRITE", "preserve"),
            ("SERVICES_SALES_DASHBOARD_TIMEOUT_MS", "1500"),
        ])
        .unwrap();

        let dashboard = service(&config, "sales-dashboard");
        assert_eq!(dashboard.url, "http://dashboard:9000/");
        assert_eq!(dashboard.rewrite, RewritePolicy::Preserve);
        assert_eq!(dashboard.timeout, Duration::from_millis(1500));

        let table = config.route_table().unwrap();
        let route = table.get("sales-dashboard").unwrap();
        assert_eq!(route.base_url(), "http://dashboard:9000");
    }

    #[test]
    fn test_global_rewrite_and_timeout() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("PATH_REWRITE", "preserve"),
            ("UPSTREAM_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert!(config.services.iter().all(|s| s.rewrite == RewritePolicy::Preserve));
        assert!(config.services.iter().all(|s| s.timeout == Duration::from_millis(250)));
    }

    #[test]
    fn test_extra_services() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("EXTRA_SERVICES", "reviews=http://reviews:8000, search=https://search.internal"),
            ("SERVICES_SEARCH_TIMEOUT_MS", "100"),
        ])
        .unwrap();

        assert_eq!(config.services.len(), DEFAULT_SERVICES.len() + 2);
        assert_eq!(service(&config, "reviews").url, "http://reviews:8000");
        assert_eq!(service(&config, "search").timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_extra_service_duplicate_rejected() {
        let err = load(&[
            ("JWT_SECRET", SECRET),
            ("EXTRA_SERVICES", "orders=http://other:1"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(load(&[("JWT_SECRET", SECRET), ("PORT", "eighty")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("PATH_REWRITE", "sideways")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("EXTRA_SERVICES", "no-equals")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("SERVICES_ORDERS_URL", "ftp://x")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("SERVICES_ORDERS_TIMEOUT_MS", "0")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_cors_lists() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("CORS_ALLOWED_ORIGINS", "https://app.example.com, https://*.example.org"),
            ("CORS_ALLOWED_METHODS", "GET,POST"),
            ("CORS_ALLOW_CREDENTIALS", "true"),
        ])
        .unwrap();

        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://app.example.com", "https://*.example.org"]
        );
        assert_eq!(config.cors.allowed_methods, vec!["GET", "POST"]);
        assert!(config.cors.allow_credentials);
    }

    #[test]
    fn test_route_table_carries_gateway_source() {
        let config = load(&[("JWT_SECRET", SECRET), ("GATEWAY_SOURCE", "edge-1")]).unwrap();
        let table = config.route_table().unwrap();
        let route = table.get("catalog").unwrap();

        assert!(
            route
                .headers()
                .iter()
                .any(|(name, value)| name == GATEWAY_SOURCE_HEADER && value == "edge-1")
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = load(&[("JWT_SECRET", SECRET)]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_metrics_disabled() {
        let config = load(&[("JWT_SECRET", SECRET), ("METRICS_PORT", "0")]).unwrap();
        assert!(!config.metrics_enabled());
        assert_eq!(config.metrics_addr(), None);
    }

    #[test]
    fn test_service_var_naming() {
        assert_eq!(service_var("sales-dashboard", "URL"), "SERVICES_SALES_DASHBOARD_URL");
        assert_eq!(service_var("orders", "TIMEOUT_MS"), "SERVICES_ORDERS_TIMEOUT_MS");
    }
}
