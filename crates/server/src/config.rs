//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DUB_TOKEN_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `DUB_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; not needed with `DUB_STORE=memory`)
//!
//! ## Optional
//! - `DUB_STORE` - `postgres` (default) or `memory`
//! - `DUB_HOST` - Bind address (default: 127.0.0.1)
//! - `DUB_PORT` - Listen port (default: 3000)
//! - `DUB_TOKEN_TTL_DAYS` - Token lifetime in days (default: 30)
//! - `DEFAULT_VBUCKS` - Starting balance for new accounts (default: 1000)
//! - `ELITE_DONATOR_VBUCKS` - Vbucks granted by the elite donor reward (default: 5000)
//! - `FULLLOCKER_MAX_SEASON` - Highest version granted by full locker (default: 15.30)
//! - `PROJECT_SEASON` - Season label stamped on shop rotations (default: 15)
//! - `PROJECT_VERSION` - Version label stamped on shop rotations (default: 15.30)
//! - `SHOP_CHECK_INTERVAL_SECS` - Background shop check period (default: 3600)
//! - `EMAIL_USER`, `EMAIL_PASSWORD` - Enable email notifications when both set
//! - `EMAIL_HOST` (default: smtp.gmail.com), `EMAIL_PORT` (default: 587),
//!   `EMAIL_FROM` (default: `EMAIL_USER`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use dub_core::{RewardTable, StarterKit};

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which storage backend to run against.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// `PostgreSQL` at the given URL.
    Postgres { database_url: SecretString },
    /// In-process maps. Data is lost on restart.
    Memory,
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token signing secret
    pub token_secret: SecretString,
    /// Bearer token lifetime
    pub token_ttl: chrono::Duration,
    pub economy: EconomyConfig,
    /// Email notifications (disabled when `None`)
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

/// Economy parameters injected into the services.
#[derive(Debug, Clone)]
pub struct EconomyConfig {
    /// What a new account starts with
    pub starter: StarterKit,
    /// Reward definitions
    pub rewards: RewardTable,
    /// Season label stamped on shop rotations
    pub season: String,
    /// Version label stamped on shop rotations
    pub version: String,
    /// How often the background task checks for a live shop
    pub shop_check_interval: Duration,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starter: StarterKit::default(),
            rewards: RewardTable::default(),
            season: "15".to_owned(),
            version: "15.30".to_owned(),
            shop_check_interval: Duration::from_secs(3600),
        }
    }
}

/// SMTP configuration for outbound email.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let store = match get_env_or_default("DUB_STORE", "postgres").as_str() {
            "postgres" => StoreConfig::Postgres {
                database_url: get_database_url("DUB_DATABASE_URL")?,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "DUB_STORE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };
        let host = parse_env::<IpAddr>("DUB_HOST", "127.0.0.1")?;
        let port = parse_env::<u16>("DUB_PORT", "3000")?;
        let token_secret = get_validated_secret("DUB_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "DUB_TOKEN_SECRET")?;
        let token_ttl = chrono::Duration::days(parse_env::<i64>("DUB_TOKEN_TTL_DAYS", "30")?);

        let economy = EconomyConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            store,
            host,
            port,
            token_secret,
            token_ttl,
            economy,
            email,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl EconomyConfig {
    /// Defaults overridden by the economy environment variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnvVar` for a value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut economy = Self::default();
        economy.starter.vbucks = parse_env("DEFAULT_VBUCKS", "1000")?;
        economy.rewards.elite_donor.vbucks = parse_env("ELITE_DONATOR_VBUCKS", "5000")?;
        economy.rewards.full_locker_cutoff = get_env_or_default("FULLLOCKER_MAX_SEASON", "15.30");
        economy.season = get_env_or_default("PROJECT_SEASON", "15");
        economy.version = get_env_or_default("PROJECT_VERSION", "15.30");
        economy.shop_check_interval =
            Duration::from_secs(parse_env("SHOP_CHECK_INTERVAL_SECS", "3600")?);
        if economy.shop_check_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOP_CHECK_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        Ok(economy)
    }
}

impl EmailConfig {
    /// Email is enabled only when both `EMAIL_USER` and `EMAIL_PASSWORD` are set.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(smtp_username), Some(password)) =
            (get_optional_env("EMAIL_USER"), get_optional_env("EMAIL_PASSWORD"))
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host: get_env_or_default("EMAIL_HOST", "smtp.gmail.com"),
            smtp_port: parse_env("EMAIL_PORT", "587")?,
            from_address: get_optional_env("EMAIL_FROM").unwrap_or_else(|| smtp_username.clone()),
            smtp_username,
            smtp_password: SecretString::from(password),
        }))
    }
}

/// Database URL from `DUB_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Used by operator tooling that needs the database but not the rest of the
/// server configuration.
///
/// # Errors
///
/// Returns `MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("DUB_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
