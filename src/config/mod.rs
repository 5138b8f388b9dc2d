use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub bridge: BridgeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            bridge: BridgeConfig::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Endpoints, credentials, and behavior toggles for the bridged systems.
///
/// Everything here is read once at startup and injected by reference; the
/// bridge never consults the process environment after construction.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub scoring_url: String,
    pub scoring_oauth_token: String,
    pub identity_url: String,
    pub crm_url: String,
    pub crm_api_key: String,
    pub report_url: String,
    pub report_token_secret: String,
    pub coupon_code: String,
    pub records_collection: String,
    pub crm_audit_collection: String,
    pub upstream_timeout: Duration,
    pub require_caller_auth: bool,
    pub extended_protocol: bool,
}

impl BridgeConfig {
    fn load() -> Result<Self, ConfigError> {
        let timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            scoring_url: required("AICVD_URL")?,
            scoring_oauth_token: required("AICVD_OAUTH_TOKEN")?,
            identity_url: required("IDENTITY_URL")?,
            crm_url: required("CRM_URL")?,
            crm_api_key: required("CRM_API_KEY")?,
            report_url: required("REPORT_URL")?,
            report_token_secret: required("REPORT_TOKEN_SECRET")?,
            coupon_code: env::var("COUPON_CODE").unwrap_or_else(|_| "HEART50".to_string()),
            records_collection: env::var("RECORDS_COLLECTION")
                .unwrap_or_else(|_| "aicvd".to_string()),
            crm_audit_collection: env::var("CRM_AUDIT_COLLECTION")
                .unwrap_or_else(|_| "aicvd_crm".to_string()),
            upstream_timeout: Duration::from_secs(timeout_secs),
            require_caller_auth: flag("REQUIRE_CALLER_AUTH", true),
            extended_protocol: flag("EXTENDED_PROTOCOL", false),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar { name }),
    }
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        ),
        Err(_) => default,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidTimeout,
    InvalidHost { source: std::net::AddrParseError },
    MissingVar { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidTimeout => {
                write!(f, "UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingVar { name } => {
                write!(f, "required environment variable {} is not set", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::MissingVar { .. } => None,
        }
    }
}
