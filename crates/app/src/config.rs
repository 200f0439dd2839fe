//! Server configuration: CLI/env over an optional TOML file over defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_DB_URL: &str = "sqlite:nexus.sqlite3?mode=rwc";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Parser, Debug, Default)]
#[command(name = "nexus-server")]
#[command(about = "NexusAlpri learning platform HTTP server")]
#[command(version)]
pub struct Cli {
    /// TOML file with the same keys as the flags below
    #[arg(short, long, env = "NEXUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite URL or bare file path
    #[arg(long, env = "NEXUS_DB_URL")]
    pub db_url: Option<String>,

    /// Listen address
    #[arg(long, env = "NEXUS_BIND")]
    pub bind: Option<SocketAddr>,

    /// Session lifetime in hours
    #[arg(long, env = "NEXUS_SESSION_TTL_HOURS")]
    pub session_ttl_hours: Option<i64>,

    /// Deliver mail through the provider URL stored in platform settings
    #[arg(long, env = "NEXUS_PROVIDER_MAIL")]
    pub provider_mail: bool,

    /// Create this administrator on startup if missing
    #[arg(long, env = "NEXUS_ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    #[arg(long, env = "NEXUS_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    #[arg(long, env = "NEXUS_ADMIN_NAME")]
    pub admin_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_url: Option<String>,
    pub bind: Option<SocketAddr>,
    pub session_ttl_hours: Option<i64>,
    #[serde(default)]
    pub provider_mail: bool,
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
}

fn default_admin_name() -> String {
    "Administrator".into()
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub bind: SocketAddr,
    pub session_ttl_hours: i64,
    pub provider_mail: bool,
    pub admin: Option<AdminConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
    }
}

impl Config {
    pub fn resolve(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: Cli, file: FileConfig) -> Result<Self> {
        let db_url = cli
            .db_url
            .or(file.db_url)
            .unwrap_or_else(|| DEFAULT_DB_URL.to_owned());
        let bind = match cli.bind.or(file.bind) {
            Some(bind) => bind,
            None => DEFAULT_BIND.parse().context("default bind address")?,
        };
        let session_ttl_hours = cli
            .session_ttl_hours
            .or(file.session_ttl_hours)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        anyhow::ensure!(
            (1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours),
            "session TTL must be between 1 and {MAX_SESSION_TTL_HOURS} hours, got {session_ttl_hours}"
        );

        let admin = match (cli.admin_email, cli.admin_password) {
            (Some(email), Some(password)) => Some(AdminConfig {
                email,
                password,
                name: cli.admin_name.unwrap_or_else(default_admin_name),
            }),
            _ => file.admin,
        };

        Ok(Self {
            db_url: normalize_db_url(&db_url),
            bind,
            session_ttl_hours,
            provider_mail: cli.provider_mail || file.provider_mail,
            admin,
        })
    }
}

/// Turns a bare file path into a `sqlite:` URL that creates the file.
pub fn normalize_db_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw == ":memory:" {
        return "sqlite::memory:".into();
    }
    if raw.starts_with("sqlite:") {
        return raw.to_owned();
    }
    format!("sqlite://{raw}?mode=rwc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_become_sqlite_urls() {
        assert_eq!(normalize_db_url("data/nexus.db"), "sqlite://data/nexus.db?mode=rwc");
        assert_eq!(normalize_db_url(":memory:"), "sqlite::memory:");
        assert_eq!(normalize_db_url("sqlite:x.db"), "sqlite:x.db");
    }

    #[test]
    fn cli_wins_over_file_and_file_over_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            db_url = "file.db"
            session_ttl_hours = 12

            [admin]
            email = "root@corp.example"
            password = "from-the-file"
            "#,
        )
        .unwrap();
        let cli = Cli {
            db_url: Some("sqlite:cli.db".into()),
            ..Cli::default()
        };

        let config = Config::merge(cli, file).unwrap();
        assert_eq!(config.db_url, "sqlite:cli.db");
        assert_eq!(config.session_ttl_hours, 12);
        assert_eq!(config.bind, DEFAULT_BIND.parse().unwrap());
        let admin = config.admin.unwrap();
        assert_eq!(admin.name, "Administrator");
        assert_eq!(admin.password, "from-the-file");
    }

    #[test]
    fn ttl_is_bounded_to_a_year() {
        let within = Cli {
            session_ttl_hours: Some(MAX_SESSION_TTL_HOURS),
            ..Cli::default()
        };
        assert!(Config::merge(within, FileConfig::default()).is_ok());

        let file: FileConfig = toml::from_str("session_ttl_hours = 3000000000").unwrap();
        assert!(Config::merge(Cli::default(), file).is_err());
        let cli = Cli {
            session_ttl_hours: Some(i64::MAX),
            ..Cli::default()
        };
        assert!(Config::merge(cli, FileConfig::default()).is_err());
    }

    #[test]
    fn rejects_non_positive_ttl_and_unknown_keys() {
        let cli = Cli {
            session_ttl_hours: Some(0),
            ..Cli::default()
        };
        assert!(Config::merge(cli, FileConfig::default()).is_err());
        assert!(toml::from_str::<FileConfig>("port = 1").is_err());
    }
}
