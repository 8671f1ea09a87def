use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024; // 50MB

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory where uploads and conversion outputs are staged.
    pub upload_dir: PathBuf,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            cors_origins: split_origins(DEFAULT_CORS_ORIGINS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Reads HOST, PORT, UPLOAD_DIR, CORS_ORIGINS and MAX_UPLOAD_BYTES,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: "PORT",
                value,
            })?,
            None => defaults.port,
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: "MAX_UPLOAD_BYTES",
                value,
            })?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|origins| split_origins(&origins))
                .unwrap_or(defaults.cors_origins),
            max_upload_bytes,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn split_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
