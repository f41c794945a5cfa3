use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WHATSAPP_API_URL: &str = "https://backend.api-wa.co/campaign/entit/api/v2";
pub const DEFAULT_SENDER_NAME: &str = "District Administration";
pub const DEFAULT_MESSAGE_SOURCE: &str = "new-landing-page form";

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
    pub messaging: MessagingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3001")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let data_file = optional_var("KPI_DATA_FILE").map(PathBuf::from);

        let delay_ms = var_or("WHATSAPP_DELAY_MS", "1000");
        let delay = delay_ms
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidDelay { value: delay_ms })?;

        let messaging = MessagingConfig {
            api_url: var_or("WHATSAPP_API_URL", DEFAULT_WHATSAPP_API_URL),
            api_key: optional_var("WHATSAPP_API_KEY"),
            sender_name: var_or("WHATSAPP_SENDER_NAME", DEFAULT_SENDER_NAME),
            source: var_or("WHATSAPP_SOURCE", DEFAULT_MESSAGE_SOURCE),
            delay,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { data_file },
            messaging,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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

/// Where the document store keeps its snapshot, if anywhere.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub data_file: Option<PathBuf>,
}

/// Outbound WhatsApp campaign settings.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub sender_name: String,
    pub source: String,
    pub delay: Duration,
}

impl MessagingConfig {
    /// Messages can only leave the process when a key is configured.
    pub fn can_send(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_WHATSAPP_API_URL.to_string(),
            api_key: None,
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            source: DEFAULT_MESSAGE_SOURCE.to_string(),
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDelay { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDelay { value } => write!(
                f,
                "WHATSAPP_DELAY_MS must be a whole number of milliseconds (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidDelay { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
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
            "KPI_DATA_FILE",
            "WHATSAPP_API_URL",
            "WHATSAPP_API_KEY",
            "WHATSAPP_SENDER_NAME",
            "WHATSAPP_SOURCE",
            "WHATSAPP_DELAY_MS",
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
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.storage.data_file.is_none());
        assert_eq!(config.messaging.api_url, DEFAULT_WHATSAPP_API_URL);
        assert_eq!(config.messaging.delay, Duration::from_millis(1000));
        assert!(!config.messaging.can_send());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3001));
        reset_env();
    }

    #[test]
    fn reads_messaging_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("WHATSAPP_API_KEY", "  secret-key ");
        env::set_var("WHATSAPP_DELAY_MS", "250");
        env::set_var("KPI_DATA_FILE", "/tmp/kpi.json");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.messaging.api_key.as_deref(), Some("secret-key"));
        assert_eq!(config.messaging.delay, Duration::from_millis(250));
        assert_eq!(
            config.storage.data_file,
            Some(PathBuf::from("/tmp/kpi.json"))
        );
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_delay() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("WHATSAPP_DELAY_MS", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidDelay { value }) => assert_eq!(value, "soon"),
            other => panic!("expected invalid delay, got {other:?}"),
        }
        reset_env();
    }
}
