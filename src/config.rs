use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_VNPAY_VERSION: &str = "2.1.0";
const DEFAULT_VNPAY_COMMAND: &str = "pay";
const DEFAULT_VNPAY_CURRENCY: &str = "VND";
const DEFAULT_VNPAY_LOCALE: &str = "vn";
const DEFAULT_VNPAY_ORDER_TYPE: &str = "other";
const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// VNPay merchant configuration.
///
/// `url`, `tmn_code`, `secret_key` and `return_url` have no built-in
/// defaults and must come from a config file or `APP__VNPAY__*`.
#[derive(Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VnPayConfig {
    /// Gateway payment endpoint
    #[validate(url)]
    pub url: String,

    /// Merchant terminal code issued by the gateway
    #[validate(length(min = 1))]
    pub tmn_code: String,

    /// HMAC-SHA512 signing secret
    #[validate(length(min = 1))]
    pub secret_key: String,

    /// Where the gateway sends the customer after payment
    #[validate(url)]
    pub return_url: String,

    #[serde(default = "default_vnpay_version")]
    pub version: String,

    #[serde(default = "default_vnpay_command")]
    pub command: String,

    #[serde(default = "default_vnpay_currency")]
    pub currency: String,

    #[serde(default = "default_vnpay_locale")]
    pub locale: String,

    #[serde(default = "default_vnpay_order_type")]
    pub order_type: String,

    /// Sent as `vnp_IpAddr` when the client address is unknown
    #[serde(default = "default_client_ip")]
    pub default_ip_addr: String,
}

impl Default for VnPayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            tmn_code: String::new(),
            secret_key: String::new(),
            return_url: String::new(),
            version: default_vnpay_version(),
            command: default_vnpay_command(),
            currency: default_vnpay_currency(),
            locale: default_vnpay_locale(),
            order_type: default_vnpay_order_type(),
            default_ip_addr: default_client_ip(),
        }
    }
}

impl fmt::Debug for VnPayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VnPayConfig")
            .field("url", &self.url)
            .field("tmn_code", &self.tmn_code)
            .field("secret_key", &"<redacted>")
            .field("return_url", &self.return_url)
            .field("version", &self.version)
            .field("command", &self.command)
            .field("currency", &self.currency)
            .field("locale", &self.locale)
            .field("order_type", &self.order_type)
            .field("default_ip_addr", &self.default_ip_addr)
            .finish()
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Request timeout applied by the HTTP layer (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Default page size for paginated API responses
    #[serde(default = "default_api_page_size")]
    pub api_default_page_size: u64,

    /// Maximum page size allowed for paginated API responses
    #[serde(default = "default_api_max_page_size")]
    pub api_max_page_size: u64,

    /// Payment gateway settings
    #[validate]
    pub vnpay: VnPayConfig,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a new configuration with defaults for everything but the
    /// database and gateway settings
    pub fn new(database_url: String, vnpay: VnPayConfig) -> Self {
        Self {
            database_url,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            vnpay,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Clamps a requested page size to the configured bounds
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.api_default_page_size)
            .clamp(1, self.api_max_page_size.max(1))
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && self.vnpay.url.contains("sandbox") {
            let mut err = ValidationError::new("vnpay_sandbox_in_production");
            err.message = Some(
                "The sandbox gateway must not be used in production. Set APP__VNPAY__URL to the live endpoint."
                    .into(),
            );
            errors.add("vnpay", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_api_page_size() -> u64 {
    20
}

fn default_api_max_page_size() -> u64 {
    100
}

fn default_vnpay_version() -> String {
    DEFAULT_VNPAY_VERSION.to_string()
}
fn default_vnpay_command() -> String {
    DEFAULT_VNPAY_COMMAND.to_string()
}
fn default_vnpay_currency() -> String {
    DEFAULT_VNPAY_CURRENCY.to_string()
}
fn default_vnpay_locale() -> String {
    DEFAULT_VNPAY_LOCALE.to_string()
}
fn default_vnpay_order_type() -> String {
    DEFAULT_VNPAY_ORDER_TYPE.to_string()
}
fn default_client_ip() -> String {
    DEFAULT_CLIENT_IP.to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("log_level");
            err.message = Some("log_level must be one of trace, debug, info, warn, error".into());
            Err(err)
        }
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("flower_shop_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

fn config_path(config_dir: &Path, name: &str) -> String {
    config_dir.join(name).to_string_lossy().into_owned()
}

/// Loads application configuration from `./config`
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*, e.g. APP__VNPAY__SECRET_KEY)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    // NOTE: the gateway secret has no default - it MUST be provided via
    // environment variable or config file.
    let config = Config::builder()
        .set_default("database_url", "sqlite://flower_shop.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&config_path(config_dir, "default")).required(false))
        .add_source(File::with_name(&config_path(config_dir, &run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("vnpay.secret_key").is_err() {
        error!("VNPay secret key is not configured. Set APP__VNPAY__SECRET_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "vnpay.secret_key is required but not configured. Set APP__VNPAY__SECRET_KEY environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn vnpay() -> VnPayConfig {
        VnPayConfig {
            url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            tmn_code: "DEMO1234".into(),
            secret_key: "TESTSECRETKEY".into(),
            return_url: "http://localhost:8080/api/v1/payments/vnpay/return".into(),
            ..VnPayConfig::default()
        }
    }

    fn write_config(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(file, "{}", content).unwrap();
        dir
    }

    #[test]
    fn new_config_passes_validation() {
        let cfg = AppConfig::new("sqlite::memory:".into(), vnpay());
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.vnpay.version, "2.1.0");
        assert_eq!(cfg.vnpay.currency, "VND");
    }

    #[test]
    fn empty_secret_fails_validation() {
        let mut gateway = vnpay();
        gateway.secret_key = String::new();
        let cfg = AppConfig::new("sqlite::memory:".into(), gateway);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sandbox_gateway_rejected_in_production() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), vnpay());
        cfg.environment = "production".into();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), vnpay());
        cfg.log_level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn page_size_is_clamped() {
        let cfg = AppConfig::new("sqlite::memory:".into(), vnpay());
        assert_eq!(cfg.page_size(None), 20);
        assert_eq!(cfg.page_size(Some(0)), 1);
        assert_eq!(cfg.page_size(Some(1_000)), 100);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", vnpay());
        assert!(!rendered.contains("TESTSECRETKEY"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn loads_gateway_settings_from_file() {
        let dir = write_config(
            r#"
            database_url = "sqlite::memory:"

            [vnpay]
            url = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"
            tmn_code = "DEMO1234"
            secret_key = "FROMFILESECRET"
            return_url = "http://localhost:8080/api/v1/payments/vnpay/return"
            "#,
        );

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.vnpay.secret_key, "FROMFILESECRET");
        assert_eq!(cfg.vnpay.locale, "vn");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn missing_secret_is_reported() {
        let dir = write_config(
            r#"
            [vnpay]
            url = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"
            tmn_code = "DEMO1234"
            return_url = "http://localhost:8080/return"
            "#,
        );

        let result = load_config_from(dir.path());
        assert!(matches!(result, Err(AppConfigError::Load(_))));
    }
}
