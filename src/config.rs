use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Port used when `PORT` is not provided.
pub const DEFAULT_PORT: u16 = 8080;
/// SMTP submission port used when `SMTP_PORT` is not provided.
pub const DEFAULT_SMTP_PORT: u16 = 587;
/// Public Gemini endpoint used when `GEMINI_BASE_URL` is not provided.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the AskDoc server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// API key sent with every Gemini request.
    pub google_api_key: String,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Directory where uploaded files are staged while a request runs.
    pub upload_dir: PathBuf,
    /// Outbound mail relay settings.
    pub smtp: SmtpConfig,
}

/// Connection parameters for the SMTP relay.
///
/// Every field except the port is optional at startup so the summarization endpoint can run
/// without mail settings; a send attempt without a host or sender fails with a delivery error.
#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    /// Relay hostname.
    pub host: Option<String>,
    /// Relay port.
    pub port: u16,
    /// Login name; credentials are only used when this is set.
    pub user: Option<String>,
    /// Password paired with `user`.
    pub pass: Option<String>,
    /// Sender mailbox placed in the `From` header.
    pub from_email: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };
        let port_or = |key: &str, default: u16| {
            optional(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u16>()
                        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
                })
                .transpose()
                .map(|port| port.unwrap_or(default))
        };

        Ok(Self {
            port: port_or("PORT", DEFAULT_PORT)?,
            google_api_key: required("GOOGLE_API_KEY")?,
            gemini_base_url: optional("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            smtp: SmtpConfig {
                host: optional("SMTP_HOST"),
                port: port_or("SMTP_PORT", DEFAULT_SMTP_PORT)?,
                user: optional("SMTP_USER"),
                pass: optional("SMTP_PASS"),
                from_email: optional("FROM_EMAIL"),
            },
        })
    }
}

/// Read `.env` (when present) and load the configuration from the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        port = config.port,
        gemini_base_url = %config.gemini_base_url,
        upload_dir = %config.upload_dir.display(),
        smtp_host = ?config.smtp.host,
        smtp_port = config.smtp.port,
        "Loaded configuration"
    );
    Ok(config)
}
