use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the toolkit.
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

/// Top-level configuration for the toolkit.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub gcp: GcpDefaults,
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

        let timeout_secs = env::var("BRC_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| HttpConfig::DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let backend = match env::var("BRC_STORAGE_BACKEND") {
            Ok(value) => StorageBackend::parse(&value)
                .ok_or(ConfigError::UnknownStorageBackend { value })?,
            Err(_) => StorageBackend::Gcs,
        };

        let storage = StorageConfig {
            backend,
            local_root: env::var("BRC_LOCAL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/buckets")),
            gcs_endpoint: env::var("BRC_GCS_ENDPOINT")
                .unwrap_or_else(|_| StorageConfig::DEFAULT_GCS_ENDPOINT.to_string()),
            access_token: non_empty_var("GOOGLE_OAUTH_ACCESS_TOKEN"),
        };

        let gcp = GcpDefaults {
            project: non_empty_var("BRC_PROJECT"),
            raw_bucket: non_empty_var("BRC_RAW_BUCKET"),
            processed_bucket: non_empty_var("BRC_PROCESSED_BUCKET"),
            photos_bucket: non_empty_var("BRC_PHOTOS_BUCKET"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            http: HttpConfig {
                timeout: Duration::from_secs(timeout_secs),
                user_agent: HttpConfig::default_user_agent(),
            },
            storage,
            gcp,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
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

/// Outbound HTTP client settings used when talking to the TSE and ISA sites.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl HttpConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

    fn default_user_agent() -> String {
        format!("brc/{}", env!("CARGO_PKG_VERSION"))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: Self::default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gcs" | "gs" | "google" => Some(Self::Gcs),
            "local" | "fs" | "filesystem" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Where buckets live: Google Cloud Storage or a directory on disk.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_root: PathBuf,
    pub gcs_endpoint: String,
    pub access_token: Option<String>,
}

impl StorageConfig {
    pub const DEFAULT_GCS_ENDPOINT: &'static str = "https://storage.googleapis.com";
}

/// Fallbacks for CLI flags that the research scripts always pass.
#[derive(Debug, Clone, Default)]
pub struct GcpDefaults {
    pub project: Option<String>,
    pub raw_bucket: Option<String>,
    pub processed_bucket: Option<String>,
    pub photos_bucket: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidTimeout,
    InvalidHost { source: std::net::AddrParseError },
    UnknownStorageBackend { value: String },
    InvalidStorageEndpoint { value: String, reason: String },
    Missing { setting: &'static str, env_var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidTimeout => {
                write!(f, "BRC_HTTP_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::UnknownStorageBackend { value } => write!(
                f,
                "BRC_STORAGE_BACKEND '{}' is not one of 'gcs' or 'local'",
                value
            ),
            ConfigError::InvalidStorageEndpoint { value, reason } => {
                write!(f, "BRC_GCS_ENDPOINT '{}' is not usable: {}", value, reason)
            }
            ConfigError::Missing { setting, env_var } => write!(
                f,
                "{} is required: pass it on the command line or set {}",
                setting, env_var
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTimeout
            | ConfigError::UnknownStorageBackend { .. }
            | ConfigError::InvalidStorageEndpoint { .. }
            | ConfigError::Missing { .. } => None,
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
            "BRC_HTTP_TIMEOUT_SECS",
            "BRC_STORAGE_BACKEND",
            "BRC_LOCAL_STORAGE_ROOT",
            "BRC_GCS_ENDPOINT",
            "GOOGLE_OAUTH_ACCESS_TOKEN",
            "BRC_PROJECT",
            "BRC_RAW_BUCKET",
            "BRC_PROCESSED_BUCKET",
            "BRC_PHOTOS_BUCKET",
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
        assert_eq!(config.http.timeout, Duration::from_secs(180));
        assert_eq!(config.storage.backend, StorageBackend::Gcs);
        assert_eq!(config.storage.gcs_endpoint, StorageConfig::DEFAULT_GCS_ENDPOINT);
        assert!(config.gcp.project.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_storage_and_bucket_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BRC_STORAGE_BACKEND", "local");
        env::set_var("BRC_LOCAL_STORAGE_ROOT", "/tmp/brc");
        env::set_var("BRC_RAW_BUCKET", "gs://raw-candidates");
        env::set_var("BRC_PROJECT", "  ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_root, PathBuf::from("/tmp/brc"));
        assert_eq!(config.gcp.raw_bucket.as_deref(), Some("gs://raw-candidates"));
        assert!(config.gcp.project.is_none(), "blank values are ignored");
        reset_env();
    }

    #[test]
    fn rejects_unknown_storage_backend() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BRC_STORAGE_BACKEND", "s3");
        let error = AppConfig::load().expect_err("unknown backend rejected");
        assert!(matches!(error, ConfigError::UnknownStorageBackend { .. }));
        reset_env();
    }
}
