use farm_core::config as core_config;
use farm_core::error::AppError;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct FarmConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub security: SecurityConfig,
    pub invitation: InvitationConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("Unknown environment '{}', expected dev|prod", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret shared by access and invitation tokens.
    #[serde(skip, default = "placeholder_secret")]
    pub secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
}

fn placeholder_secret() -> Secret<String> {
    Secret::new(String::new())
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Base URL embedded in invitation links sent by email.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    pub expiry_days: i64,
}

impl FarmConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = FarmConfig {
            common,
            environment,
            service_name: get_env("SERVICE_NAME", Some("farm-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env(
                    "DATABASE_URL",
                    Some("postgres://localhost/farmdeck"),
                    is_prod,
                )?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!("DATABASE_MAX_CONNECTIONS: {}", e)))?,
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!("DATABASE_MIN_CONNECTIONS: {}", e)))?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env(
                    "JWT_SECRET",
                    Some("dev-only-signing-secret-change-me"),
                    is_prod,
                )?),
                access_token_expiry_minutes: get_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    is_prod,
                )?
                .parse()
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("JWT_ACCESS_TOKEN_EXPIRY_MINUTES: {}", e))
                })?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@farmdeck.local"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:8080"),
                    is_prod,
                )?,
            },
            invitation: InvitationConfig {
                expiry_days: get_env("INVITATION_EXPIRY_DAYS", Some("7"), is_prod)?
                    .parse()
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!("INVITATION_EXPIRY_DAYS: {}", e)))?,
            },
        };

        Ok(config)
    }
}

/// Read an environment variable, falling back to the dev default.
///
/// In prod, defaults are not applied: every listed variable must be set
/// explicitly so a misconfigured deployment fails at startup.
fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => match default {
            Some(d) if !is_prod => Ok(d.to_string()),
            _ => Err(AppError::ConfigError(anyhow::anyhow!(
                "Missing required environment variable: {}",
                key
            ))),
        },
    }
}
