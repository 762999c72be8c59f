//! Server configuration: development defaults, overridable from the environment.

use crate::error::Error;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// PostgreSQL connection string. Database setup is skipped when unset.
    pub dsn: Option<String>,
    pub http_port: u16,
    /// Serve over TLS using `cert_path` / `key_path`.
    pub auto_tls: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Human-readable log lines instead of JSON.
    pub friendly_logging: bool,
    /// Host names accepted during the TLS handshake. Empty accepts any.
    pub domains: Vec<String>,
    pub template_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::development()
    }
}

impl Config {
    pub fn development() -> Self {
        Self {
            dsn: None,
            http_port: 80,
            auto_tls: false,
            cert_path: None,
            key_path: None,
            friendly_logging: true,
            domains: Vec::new(),
            template_dir: PathBuf::from("www"),
        }
    }

    /// Development defaults overridden by `.env` and process environment.
    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::development();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dsn) = get("DATABASE_URL") {
            config.dsn = Some(dsn);
        }
        if let Some(port) = get("HTTP_PORT") {
            config.http_port = parse("HTTP_PORT", &port)?;
        }
        if let Some(v) = get("AUTO_TLS") {
            config.auto_tls = parse_bool("AUTO_TLS", &v)?;
        }
        if let Some(v) = get("FRIENDLY_LOGGING") {
            config.friendly_logging = parse_bool("FRIENDLY_LOGGING", &v)?;
        }
        config.cert_path = get("TLS_CERT_PATH").map(PathBuf::from);
        config.key_path = get("TLS_KEY_PATH").map(PathBuf::from);
        if let Some(domains) = get("DOMAINS") {
            config.domains = domains
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(dir) = get("TEMPLATE_DIR") {
            config.template_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key}: invalid value '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key}: invalid boolean '{value}'"))),
    }
}
