use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "changeme",
    "dev-secret-change-me",
    "secret",
    "your-secret-here",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("PARLOR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLOR_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let db_path: PathBuf = lookup("PARLOR_DB_PATH")
            .unwrap_or_else(|| "parlor.db".into())
            .into();
        let host = lookup("PARLOR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("PARLOR_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PARLOR_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let ttl_hours: i64 = match lookup("PARLOR_TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .parse()
                .context("PARLOR_TOKEN_TTL_HOURS must be a whole number of hours")?,
            None => 24,
        };
        if ttl_hours <= 0 {
            bail!("PARLOR_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl: chrono::Duration::hours(ttl_hours),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let cfg = config(&[("PARLOR_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("parlor.db"));
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(24));
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert!(config(&[]).is_err());
        assert!(config(&[("PARLOR_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("PARLOR_JWT_SECRET", "a-real-secret"),
            ("PARLOR_HOST", "127.0.0.1"),
            ("PARLOR_PORT", "8080"),
            ("PARLOR_DB_PATH", "/tmp/chat.db"),
            ("PARLOR_TOKEN_TTL_HOURS", "2"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/chat.db"));
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(2));

        assert!(config(&[("PARLOR_JWT_SECRET", "a-real-secret"), ("PARLOR_PORT", "http")]).is_err());
        assert!(
            config(&[("PARLOR_JWT_SECRET", "a-real-secret"), ("PARLOR_TOKEN_TTL_HOURS", "0")]).is_err()
        );
    }
}
