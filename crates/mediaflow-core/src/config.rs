//! Configuration module
//!
//! Settings are read once from the environment (and an optional `.env` file).
//! Invalid numeric values fall back to their defaults; `validate()` rejects
//! combinations the engine cannot run with.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const SERVER_PORT: u16 = 3000;
const DB_MAX_CONNECTIONS: u32 = 10;
const PROBE_TIMEOUT_SECS: u64 = 60;
const TRANSCODE_TIMEOUT_SECS: u64 = 600;
const STAGING_CLEANUP_GRACE_SECS: u64 = 1;
const STAGING_SWEEP_INTERVAL_SECS: u64 = 60;
const STAGING_ORPHAN_TTL_SECS: u64 = 86_400;
const MAX_UPLOAD_SIZE_MB: usize = 2048;
const HTTP_CONCURRENCY_LIMIT: usize = 256;

/// Server and database settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub max_upload_size_mb: usize,
    pub http_concurrency_limit: usize,
    pub log_format: String,
}

/// Media engine settings: directories, external tools and staging lifecycle
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub upload_dir: PathBuf,
    pub temporary_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub probe_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
    pub staging_cleanup_grace_secs: u64,
    pub staging_sweep_interval_secs: u64,
    /// 0 disables orphan reaping.
    pub staging_orphan_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MediaflowConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<MediaflowConfig>);

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config(Box::new(MediaflowConfig::from_env()?)))
    }

    /// Default server settings around the given engine settings, without a
    /// database.
    pub fn with_engine(engine: EngineConfig) -> Self {
        Config(Box::new(MediaflowConfig {
            server: ServerConfig {
                server_port: SERVER_PORT,
                environment: "development".to_string(),
                database_url: None,
                db_max_connections: DB_MAX_CONNECTIONS,
                max_upload_size_mb: MAX_UPLOAD_SIZE_MB,
                http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
                log_format: "text".to_string(),
            },
            engine,
        }))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn is_production(&self) -> bool {
        let env = self.0.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.0.server.server_port
    }

    pub fn database_url(&self) -> Option<&str> {
        self.0.server.database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.server.db_max_connections
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.0.server.max_upload_size_mb * 1024 * 1024
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.0.server.http_concurrency_limit
    }

    pub fn json_logs(&self) -> bool {
        self.0.server.log_format.eq_ignore_ascii_case("json")
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.0.engine
    }
}

impl EngineConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn staging_cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.staging_cleanup_grace_secs)
    }

    pub fn staging_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.staging_sweep_interval_secs)
    }

    pub fn staging_orphan_ttl(&self) -> Option<Duration> {
        (self.staging_orphan_ttl_secs > 0).then(|| Duration::from_secs(self.staging_orphan_ttl_secs))
    }

    /// Defaults rooted at the given directories, used by tests and embedders
    /// that do not read the environment.
    pub fn with_dirs(upload_dir: impl Into<PathBuf>, temporary_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            temporary_dir: temporary_dir.into(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            probe_timeout_secs: PROBE_TIMEOUT_SECS,
            transcode_timeout_secs: TRANSCODE_TIMEOUT_SECS,
            staging_cleanup_grace_secs: STAGING_CLEANUP_GRACE_SECS,
            staging_sweep_interval_secs: STAGING_SWEEP_INTERVAL_SECS,
            staging_orphan_ttl_secs: STAGING_ORPHAN_TTL_SECS,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("MEDIA_UPLOAD_DIR must not be empty"));
        }
        if self.temporary_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("MEDIA_TEMPORARY_DIR must not be empty"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(anyhow::anyhow!("PROBE_TIMEOUT_SECS must be greater than 0"));
        }
        if self.transcode_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "TRANSCODE_TIMEOUT_SECS must be greater than 0"
            ));
        }
        if self.staging_sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "STAGING_SWEEP_INTERVAL_SECS must be greater than 0"
            ));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

impl MediaflowConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let server = ServerConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            max_upload_size_mb: env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB),
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        };

        let engine = EngineConfig {
            upload_dir: env::var("MEDIA_UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
            temporary_dir: env::var("MEDIA_TEMPORARY_DIR")
                .unwrap_or_else(|_| "./tmp".to_string())
                .into(),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            probe_timeout_secs: env_or("PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS),
            transcode_timeout_secs: env_or("TRANSCODE_TIMEOUT_SECS", TRANSCODE_TIMEOUT_SECS),
            staging_cleanup_grace_secs: env_or(
                "STAGING_CLEANUP_GRACE_SECS",
                STAGING_CLEANUP_GRACE_SECS,
            ),
            staging_sweep_interval_secs: env_or(
                "STAGING_SWEEP_INTERVAL_SECS",
                STAGING_SWEEP_INTERVAL_SECS,
            ),
            staging_orphan_ttl_secs: env_or("STAGING_ORPHAN_TTL_SECS", STAGING_ORPHAN_TTL_SECS),
        };

        Ok(Self { server, engine })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.server.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }
        if self.server.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than 0"));
        }
        if self.server.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be greater than 0"));
        }
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_validate() {
        let engine = EngineConfig::with_dirs("./uploads", "./tmp");
        assert!(engine.validate().is_ok());
        assert_eq!(engine.probe_timeout(), Duration::from_secs(60));
        assert_eq!(engine.staging_orphan_ttl(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut engine = EngineConfig::with_dirs("./uploads", "./tmp");
        engine.transcode_timeout_secs = 0;
        let err = engine.validate().unwrap_err();
        assert!(err.to_string().contains("TRANSCODE_TIMEOUT_SECS"));
    }

    #[test]
    fn test_orphan_ttl_zero_disables_reaping() {
        let mut engine = EngineConfig::with_dirs("./uploads", "./tmp");
        engine.staging_orphan_ttl_secs = 0;
        assert_eq!(engine.staging_orphan_ttl(), None);
    }

    #[test]
    fn test_empty_upload_dir_rejected() {
        let engine = EngineConfig::with_dirs("", "./tmp");
        assert!(engine.validate().is_err());
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let config = MediaflowConfig {
            server: ServerConfig {
                server_port: 3000,
                environment: "development".to_string(),
                database_url: Some("mysql://localhost/media".to_string()),
                db_max_connections: 10,
                max_upload_size_mb: 10,
                http_concurrency_limit: 16,
                log_format: "text".to_string(),
            },
            engine: EngineConfig::with_dirs("./uploads", "./tmp"),
        };
        assert!(config.validate().is_err());
    }
}
