use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::review::branch::{MeasureKind, DEFAULT_FALLBACK_BRANCH, DEFAULT_THRESHOLD};

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
    pub storage: StorageConfig,
    pub matcher: MatcherConfig,
    pub mail: MailConfig,
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
            storage: StorageConfig::from_env(),
            matcher: MatcherConfig::from_env()?,
            mail: MailConfig::from_env()?,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Locations of the applicant database, letter templates, and generated letters.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub output_root: PathBuf,
    pub higher_studies_template: PathBuf,
    pub professional_template: PathBuf,
}

impl StorageConfig {
    fn from_env() -> Self {
        let path = |key: &str, default: &str| {
            PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
        };

        Self {
            database_path: path("LOR_DATABASE_PATH", "database/signup.db"),
            output_root: path("LOR_OUTPUT_ROOT", "All_LORs"),
            higher_studies_template: path("LOR_TEMPLATE_HIGHER_STUDIES", "templates/LOR.txt"),
            professional_template: path("LOR_TEMPLATE_PROFESSIONAL", "templates/LOR1.txt"),
        }
    }
}

/// Branch matching acceptance threshold, similarity measure, and fallback bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    pub threshold: f64,
    pub measure: MeasureKind,
    pub fallback: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            measure: MeasureKind::TokenOverlap,
            fallback: DEFAULT_FALLBACK_BRANCH.to_string(),
        }
    }
}

impl MatcherConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let threshold = match env::var("LOR_BRANCH_THRESHOLD") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| (0.0..=1.0).contains(value))
                .ok_or(ConfigError::InvalidThreshold(raw))?,
            Err(_) => defaults.threshold,
        };

        let measure = match env::var("LOR_BRANCH_MEASURE") {
            Ok(raw) => MeasureKind::parse(&raw).ok_or(ConfigError::InvalidMeasure(raw))?,
            Err(_) => defaults.measure,
        };

        let fallback = env::var("LOR_BRANCH_FALLBACK")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.fallback);

        Ok(Self {
            threshold,
            measure,
            fallback,
        })
    }
}

/// How the SMTP session is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain connect on the submission port, then upgrade with STARTTLS.
    StartTls,
    /// TLS from the first byte on the secure port.
    ImplicitTls,
}

impl SmtpSecurity {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starttls" | "start_tls" => Some(Self::StartTls),
            "tls" | "ssl" | "implicit" => Some(Self::ImplicitTls),
            _ => None,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::StartTls => 587,
            Self::ImplicitTls => 465,
        }
    }
}

/// Sender identity used to authenticate against the SMTP relay.
#[derive(Clone, PartialEq, Eq)]
pub struct MailCredentials {
    pub address: String,
    pub password: String,
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub credentials: Option<MailCredentials>,
}

impl MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let security = match env::var("LOR_SMTP_SECURITY") {
            Ok(raw) => SmtpSecurity::parse(&raw).ok_or(ConfigError::InvalidSmtpSecurity(raw))?,
            Err(_) => SmtpSecurity::StartTls,
        };

        let port = match env::var("LOR_SMTP_PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidSmtpPort)?,
            Err(_) => security.default_port(),
        };

        let host = env::var("LOR_SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());

        let address = env::var("LOR_MAIL_ADDRESS").or_else(|_| env::var("MY_MAIL"));
        let password = env::var("LOR_MAIL_PASSWORD").or_else(|_| env::var("PASSWORD"));
        let credentials = match (address, password) {
            (Ok(address), Ok(password)) => Some(MailCredentials { address, password }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            security,
            credentials,
        })
    }

    pub fn require_credentials(&self) -> Result<&MailCredentials, ConfigError> {
        self.credentials
            .as_ref()
            .ok_or(ConfigError::MissingMailCredentials)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidThreshold(String),
    InvalidMeasure(String),
    InvalidSmtpSecurity(String),
    InvalidSmtpPort,
    MissingMailCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidThreshold(raw) => write!(
                f,
                "LOR_BRANCH_THRESHOLD must be a number between 0 and 1 (got '{raw}')"
            ),
            ConfigError::InvalidMeasure(raw) => write!(
                f,
                "LOR_BRANCH_MEASURE must be 'token' or 'edit' (got '{raw}')"
            ),
            ConfigError::InvalidSmtpSecurity(raw) => write!(
                f,
                "LOR_SMTP_SECURITY must be 'starttls' or 'tls' (got '{raw}')"
            ),
            ConfigError::InvalidSmtpPort => write!(f, "LOR_SMTP_PORT must be a valid u16"),
            ConfigError::MissingMailCredentials => write!(
                f,
                "mail credentials missing: set LOR_MAIL_ADDRESS and LOR_MAIL_PASSWORD \
                 (or MY_MAIL and PASSWORD)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "LOR_DATABASE_PATH",
            "LOR_OUTPUT_ROOT",
            "LOR_TEMPLATE_HIGHER_STUDIES",
            "LOR_TEMPLATE_PROFESSIONAL",
            "LOR_BRANCH_THRESHOLD",
            "LOR_BRANCH_MEASURE",
            "LOR_BRANCH_FALLBACK",
            "LOR_SMTP_HOST",
            "LOR_SMTP_PORT",
            "LOR_SMTP_SECURITY",
            "LOR_MAIL_ADDRESS",
            "LOR_MAIL_PASSWORD",
            "MY_MAIL",
            "PASSWORD",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.storage.output_root, PathBuf::from("All_LORs"));
        assert_eq!(config.matcher, MatcherConfig::default());
        assert_eq!(config.mail.security, SmtpSecurity::StartTls);
        assert_eq!(config.mail.port, 587);
        assert_eq!(config.mail.host, "smtp.gmail.com");
        assert!(config.mail.credentials.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn implicit_tls_defaults_to_secure_port() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOR_SMTP_SECURITY", "tls");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.mail.security, SmtpSecurity::ImplicitTls);
        assert_eq!(config.mail.port, 465);
    }

    #[test]
    fn legacy_credential_names_are_honored() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MY_MAIL", "registrar@example.edu");
        env::set_var("PASSWORD", "app-token");
        let config = AppConfig::load().expect("config loads");
        let credentials = config.mail.require_credentials().expect("credentials present");
        assert_eq!(credentials.address, "registrar@example.edu");
        assert!(!format!("{credentials:?}").contains("app-token"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOR_BRANCH_THRESHOLD", "1.5");
        match AppConfig::load() {
            Err(ConfigError::InvalidThreshold(raw)) => assert_eq!(raw, "1.5"),
            other => panic!("expected threshold error, got {other:?}"),
        }
        reset_env();
    }
}
