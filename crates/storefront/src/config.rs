//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All are optional in development.
//! - `DB_PATH` - `SQLite` file (default: ./crochet.db)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8585)
//! - `BASE_URL` - Public URL used in emailed links (default: <http://localhost:{PORT}>)
//! - `COOKIE_DOMAIN` - Session cookie domain
//! - `COOKIE_SECURE` - Set to `false` to allow the session cookie over plain HTTP
//! - `CSRF_KEY` - Base64, at least 32 bytes once decoded
//! - `SESSION_KEY` - Base64, at least 32 bytes once decoded
//! - `APP_ENV` - `production` makes missing or weak keys fatal
//! - `STATIC_DIR` - Directory served at `/static` (default: crates/storefront/static)
//! - `RATE_LIMIT_WINDOW_SECS` - Per-IP spacing of form submissions (default: 60, 0 disables)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::TryRngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Minimum decoded length of `CSRF_KEY` and `SESSION_KEY`.
pub const MIN_KEY_BYTES: usize = 32;
const MIN_ENTROPY_BITS_PER_BYTE: f64 = 3.3;

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

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Storefront application configuration.
///
/// Keys are `SecretString`, so the derived `Debug` never prints them.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `SQLite` database file
    pub database_path: String,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for links in emails
    pub base_url: String,
    /// Session cookie domain
    pub cookie_domain: Option<String>,
    /// Whether the session cookie is HTTPS-only
    pub cookie_secure: bool,
    /// Base64 key for CSRF tokens
    pub csrf_key: SecretString,
    /// Base64 key for signing the session cookie
    pub session_key: SecretString,
    /// Development or production
    pub environment: AppEnvironment,
    /// Directory served at `/static`
    pub static_dir: PathBuf,
    /// Directory product photos are written to, always `{static_dir}/uploads`
    pub upload_dir: PathBuf,
    /// Minimum spacing between rate-limited requests from one IP; zero disables
    pub rate_limit_window: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Key variables that were unset and replaced with random development keys
    pub generated_keys: Vec<&'static str>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed, or in production if
    /// a key is missing or too weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let environment = match env.or_default("APP_ENV", "development").as_str() {
            "production" => AppEnvironment::Production,
            _ => AppEnvironment::Development,
        };

        let host = env.parsed::<IpAddr>("HOST", "0.0.0.0")?;
        let port = env.parsed::<u16>("PORT", "8585")?;
        let base_url = env
            .optional("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BASE_URL".to_string(), e.to_string()))?;

        let static_dir = PathBuf::from(env.or_default("STATIC_DIR", "crates/storefront/static"));
        let upload_dir = static_dir.join("uploads");

        let mut generated_keys = Vec::new();
        let csrf_key = load_key(&env, "CSRF_KEY", environment, &mut generated_keys)?;
        let session_key = load_key(&env, "SESSION_KEY", environment, &mut generated_keys)?;

        Ok(Self {
            database_path: env.or_default("DB_PATH", "./crochet.db"),
            host,
            port,
            base_url,
            cookie_domain: env.optional("COOKIE_DOMAIN"),
            cookie_secure: env.optional("COOKIE_SECURE").as_deref() != Some("false"),
            csrf_key,
            session_key,
            environment,
            static_dir,
            upload_dir,
            rate_limit_window: Duration::from_secs(env.parsed::<u64>(
                "RATE_LIMIT_WINDOW_SECS",
                "60",
            )?),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            generated_keys,
        })
    }

    /// Warn about every key replaced with a random development key.
    ///
    /// Call once the tracing subscriber is installed.
    pub fn warn_generated_keys(&self) {
        for var in &self.generated_keys {
            tracing::warn!(
                var = *var,
                "Not set; using a random development key. Sessions and forms will not survive a restart"
            );
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Decoded CSRF key bytes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the key is not valid base64.
    pub fn csrf_key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        decode_key(&self.csrf_key, "CSRF_KEY")
    }

    /// Decoded session key bytes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the key is not valid base64.
    pub fn session_key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        decode_key(&self.session_key, "SESSION_KEY")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

/// Load a base64 key, generating a throwaway one in development.
fn load_key<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
    key: &'static str,
    environment: AppEnvironment,
    generated: &mut Vec<&'static str>,
) -> Result<SecretString, ConfigError> {
    match env.optional(key) {
        Some(value) => {
            let secret = SecretString::from(value);
            let bytes = decode_key(&secret, key)?;
            validate_key_strength(&bytes, key)?;
            Ok(secret)
        }
        None if environment.is_production() => Err(ConfigError::MissingEnvVar(key.to_string())),
        None => {
            generated.push(key);
            generate_key(key)
        }
    }
}

/// Generate a random base64 key of `MIN_KEY_BYTES` bytes.
fn generate_key(key: &str) -> Result<SecretString, ConfigError> {
    let mut bytes = [0u8; MIN_KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ConfigError::InsecureSecret(key.to_string(), e.to_string()))?;
    Ok(SecretString::from(BASE64.encode(bytes)))
}

fn decode_key(secret: &SecretString, key: &str) -> Result<Vec<u8>, ConfigError> {
    BASE64
        .decode(secret.expose_secret().trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("not base64: {e}")))
}

/// Calculate Shannon entropy in bits per byte.
fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<u8, usize> = HashMap::new();
    for b in bytes {
        *freq.entry(*b).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Key length will never exceed f64 precision
    let len = bytes.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Byte count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a decoded key is long enough and not an obvious pattern.
fn validate_key_strength(bytes: &[u8], var_name: &str) -> Result<(), ConfigError> {
    if bytes.len() < MIN_KEY_BYTES {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must decode to at least {MIN_KEY_BYTES} bytes (got {})",
                bytes.len()
            ),
        ));
    }

    let entropy = shannon_entropy(bytes);
    if entropy < MIN_ENTROPY_BITS_PER_BYTE {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/byte, need >= {MIN_ENTROPY_BITS_PER_BYTE:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn random_key() -> String {
        generate_key("TEST").unwrap().expose_secret().to_string()
    }

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_path, "./crochet.db");
        assert_eq!(config.port, 8585);
        assert_eq!(config.base_url, "http://localhost:8585");
        assert!(config.cookie_secure);
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.upload_dir, PathBuf::from("crates/storefront/static").join("uploads"));
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert!(config.csrf_key_bytes().unwrap().len() >= MIN_KEY_BYTES);
        assert_ne!(
            config.csrf_key.expose_secret(),
            config.session_key.expose_secret()
        );
    }

    #[test]
    fn test_generated_keys_are_recorded() {
        assert_eq!(load(&[]).unwrap().generated_keys, ["CSRF_KEY", "SESSION_KEY"]);

        let key = random_key();
        let config = load(&[("CSRF_KEY", key.as_str())]).unwrap();
        assert_eq!(config.generated_keys, ["SESSION_KEY"]);

        let config = load(&[("CSRF_KEY", key.as_str()), ("SESSION_KEY", key.as_str())]).unwrap();
        assert!(config.generated_keys.is_empty());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_generated_keys_are_logged() {
        let config = load(&[]).unwrap();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || config.warn_generated_keys());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("random development key"));
        assert!(output.contains("CSRF_KEY"));
        assert!(output.contains("SESSION_KEY"));
    }

    #[test]
    fn test_base_url_follows_port() {
        let config = load(&[("PORT", "9000")]).unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_cookie_secure_only_disabled_by_false() {
        assert!(!load(&[("COOKIE_SECURE", "false")]).unwrap().cookie_secure);
        assert!(load(&[("COOKIE_SECURE", "0")]).unwrap().cookie_secure);
        assert!(load(&[("COOKIE_SECURE", "no")]).unwrap().cookie_secure);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_production_requires_keys() {
        let result = load(&[("APP_ENV", "production")]);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));

        let csrf = random_key();
        let session = random_key();
        let config = load(&[
            ("APP_ENV", "production"),
            ("CSRF_KEY", &csrf),
            ("SESSION_KEY", &session),
        ])
        .unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.csrf_key.expose_secret(), csrf);
    }

    #[test]
    fn test_short_key_rejected() {
        let short = BASE64.encode([7u8; 16]);
        assert!(matches!(
            load(&[("CSRF_KEY", &short)]),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_low_entropy_key_rejected() {
        let zeros = BASE64.encode([0u8; 32]);
        assert!(matches!(
            load(&[("SESSION_KEY", &zeros)]),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_non_base64_key_rejected() {
        assert!(matches!(
            load(&[("CSRF_KEY", "not base64 at all!!")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_rate_limit_window_zero() {
        let config = load(&[("RATE_LIMIT_WINDOW_SECS", "0")]).unwrap();
        assert!(config.rate_limit_window.is_zero());
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy(&[]) - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy(&[9; 10]) - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy(&[1, 2]) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = load(&[]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains(config.csrf_key.expose_secret()));
        assert!(!debug_output.contains(config.session_key.expose_secret()));
    }

    #[test]
    fn test_socket_addr() {
        let config = load(&[("HOST", "127.0.0.1"), ("PORT", "3000")]).unwrap();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
