use std::env;

use thiserror::Error;

use crate::gate::{AccessPolicy, PolicyError};

pub const DEFAULT_PORT: u16 = 3000;
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup, then shared
/// read-only through the application state via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local `x-user-id` bypass and log format.
    pub env: Env,
    // TCP port the HTTP server listens on.
    pub port: u16,
    // Postgres connection string. `None` (local only) selects the in-memory store.
    pub db_url: Option<String>,
    // Secret used to verify incoming HS256 JWTs.
    pub jwt_secret: String,
    // Which operations require which role.
    pub access_policy: AccessPolicy,
}

/// Env
///
/// The runtime context: `Local` for development conveniences, `Production` for
/// hardened settings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("PORT must be a number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    #[error("ACCESS_POLICY is invalid: {0}")]
    InvalidPolicy(#[from] PolicyError),
}

impl Default for AppConfig {
    /// Safe values for tests: local mode, in-memory store, default access policy.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: DEFAULT_PORT,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            access_policy: AccessPolicy::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Fails fast when production is
    /// missing a secret or when a value cannot be parsed, so the server never starts with
    /// a half-valid configuration.
    ///
    /// | Variable        | Default                        |
    /// |-----------------|--------------------------------|
    /// | `APP_ENV`       | `local`                        |
    /// | `PORT`          | `3000`                         |
    /// | `DATABASE_URL`  | none (required in production)  |
    /// | `JWT_SECRET`    | local fallback (required in production) |
    /// | `ACCESS_POLICY` | `list=user,get=user`           |
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or(ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt_secret = env::var("JWT_SECRET").ok().filter(|v| !v.is_empty());

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(db_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?,
            ),
            Env::Local => (
                db_url,
                jwt_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let access_policy = match env::var("ACCESS_POLICY") {
            Ok(spec) => AccessPolicy::parse(&spec)?,
            Err(_) => AccessPolicy::default(),
        };

        Ok(Self {
            env,
            port,
            db_url,
            jwt_secret,
            access_policy,
        })
    }
}
