//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::auth::DEFAULT_COST;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
    /// Bound on opening a connection and on waiting for a pooled one
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "auditoria_seo".to_string(),
            max_pool_size: 4,
            require_tls: false,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Installer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    /// Directory under which data/, uploads/, temp/ and logs/ live
    pub base_dir: PathBuf,
    /// Schema file read on every schema action; the bundled schema when unset
    pub schema_path: Option<PathBuf>,
    /// Minimum `server_version_num`
    pub min_server_version: i32,
    /// Development only: blank administrator fields fall back to defaults
    pub allow_default_admin: bool,
    pub bcrypt_cost: u32,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            schema_path: None,
            min_server_version: 120000,
            allow_default_admin: false,
            bcrypt_cost: DEFAULT_COST,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub install: InstallConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup, falling back to defaults.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };

        let server = ServerConfig {
            host: parse_var(&lookup, "HOST").unwrap_or_else(|| ServerConfig::default().host),
            port: parse_var(&lookup, "PORT").unwrap_or_else(|| ServerConfig::default().port),
        };

        let defaults = DatabaseConfig::default();
        let max_pool_size = parse_var(&lookup, "DB_MAX_CONNECTIONS").unwrap_or(defaults.max_pool_size);
        let require_tls = lookup("DB_SSLMODE").is_some_and(|m| m.trim() == "require");
        let connect_timeout = parse_var(&lookup, "DB_CONNECT_TIMEOUT_SECS")
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        // Try to load DATABASE_URL first (modern format), fall back to individual vars
        let database = if let Some(database_url) = lookup("DATABASE_URL") {
            let mut config = Self::parse_database_url(&database_url)?;
            config.max_pool_size = max_pool_size;
            config.require_tls |= require_tls;
            config.connect_timeout = connect_timeout;
            config
        } else {
            DatabaseConfig {
                host: lookup("DB_HOST").unwrap_or(defaults.host),
                port: parse_var(&lookup, "DB_PORT").unwrap_or(defaults.port),
                user: lookup("DB_USER").unwrap_or(defaults.user),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                database: lookup("DB_NAME").unwrap_or(defaults.database),
                max_pool_size,
                require_tls,
                connect_timeout,
            }
        };

        let cors = CorsConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let install_defaults = InstallConfig::default();
        let bcrypt_cost = parse_var(&lookup, "INSTALL_BCRYPT_COST").unwrap_or(install_defaults.bcrypt_cost);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "INSTALL_BCRYPT_COST must be between 4 and 31, got {}",
                bcrypt_cost
            )));
        }

        let install = InstallConfig {
            base_dir: lookup("INSTALL_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(install_defaults.base_dir),
            schema_path: lookup("INSTALL_SCHEMA_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            min_server_version: parse_var(&lookup, "INSTALL_MIN_SERVER_VERSION")
                .unwrap_or(install_defaults.min_server_version),
            allow_default_admin: flag("INSTALL_ALLOW_DEFAULT_ADMIN"),
            bcrypt_cost,
        };

        Ok(Self {
            server,
            database,
            cors,
            install,
        })
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str) -> Result<DatabaseConfig, ConfigError> {
        let parsed = url::Url::parse(url).map_err(|_| {
            ConfigError::InvalidValue("Invalid DATABASE_URL format (expected postgresql://...)".to_string())
        })?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::InvalidValue(format!(
                "Unsupported DATABASE_URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(ConfigError::InvalidValue(
                "Missing database name in DATABASE_URL".to_string(),
            ));
        }

        let require_tls = parsed
            .query_pairs()
            .any(|(key, value)| key == "sslmode" && value == "require");

        Ok(DatabaseConfig {
            host,
            port: parsed.port().unwrap_or(5432),
            user: parsed.username().to_string(),
            password: parsed.password().map(|p| p.to_string()).unwrap_or_default(),
            database,
            require_tls,
            ..DatabaseConfig::default()
        })
    }
}

/// Parse a variable, treating unparseable values as unset
fn parse_var<T, L>(lookup: &L, key: &str) -> Option<T>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.database.host, "localhost");
        assert_eq!(settings.database.port, 5432);
        assert_eq!(settings.install.base_dir, PathBuf::from("."));
        assert!(settings.install.schema_path.is_none());
        assert!(!settings.install.allow_default_admin);
        assert_eq!(settings.install.bcrypt_cost, DEFAULT_COST);
        assert_eq!(settings.database.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_connect_timeout() {
        let settings = settings_from(&[("DB_CONNECT_TIMEOUT_SECS", "2")]).unwrap();
        assert_eq!(settings.database.connect_timeout, Duration::from_secs(2));

        let settings = settings_from(&[
            ("DATABASE_URL", "postgres://seo:pw@db.internal/audits"),
            ("DB_CONNECT_TIMEOUT_SECS", "9"),
        ])
        .unwrap();
        assert_eq!(settings.database.connect_timeout, Duration::from_secs(9));

        let settings = settings_from(&[("DB_CONNECT_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(settings.database.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let settings = settings_from(&[
            ("DATABASE_URL", "postgres://seo:pw@db.internal:5433/audits?sslmode=require"),
            ("DB_HOST", "ignored"),
            ("DB_MAX_CONNECTIONS", "8"),
        ])
        .unwrap();

        assert_eq!(settings.database.host, "db.internal");
        assert_eq!(settings.database.port, 5433);
        assert_eq!(settings.database.user, "seo");
        assert_eq!(settings.database.password, "pw");
        assert_eq!(settings.database.database, "audits");
        assert_eq!(settings.database.max_pool_size, 8);
        assert!(settings.database.require_tls);
    }

    #[test]
    fn test_invalid_database_url() {
        assert!(settings_from(&[("DATABASE_URL", "not a url")]).is_err());
        assert!(settings_from(&[("DATABASE_URL", "mysql://u:p@host/db")]).is_err());
        assert!(settings_from(&[("DATABASE_URL", "postgres://u:p@host/")]).is_err());
    }

    #[test]
    fn test_install_settings() {
        let settings = settings_from(&[
            ("INSTALL_BASE_DIR", "/srv/seo"),
            ("INSTALL_SCHEMA_PATH", "/srv/seo/schema.sql"),
            ("INSTALL_ALLOW_DEFAULT_ADMIN", "true"),
            ("INSTALL_MIN_SERVER_VERSION", "140000"),
            ("INSTALL_BCRYPT_COST", "6"),
        ])
        .unwrap();

        assert_eq!(settings.install.base_dir, PathBuf::from("/srv/seo"));
        assert_eq!(settings.install.schema_path, Some(PathBuf::from("/srv/seo/schema.sql")));
        assert!(settings.install.allow_default_admin);
        assert_eq!(settings.install.min_server_version, 140000);
        assert_eq!(settings.install.bcrypt_cost, 6);
    }

    #[test]
    fn test_bcrypt_cost_out_of_range() {
        assert!(settings_from(&[("INSTALL_BCRYPT_COST", "2")]).is_err());
    }
}
