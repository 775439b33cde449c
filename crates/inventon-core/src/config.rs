//! Process configuration, read once at startup and passed down explicitly.

use std::time::Duration;

use anyhow::{Context, Result, bail};

use inventon_types::StorageConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_PATH: &str = "data/inventon.db";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Role whose members hold administrative privilege. Unset disables the role signal.
    pub admin_role_id: Option<i64>,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("INVENTON_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match var("INVENTON_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("INVENTON_PORT is not a port number: {}", raw))?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = var("INVENTON_JWT_SECRET").context("INVENTON_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("INVENTON_JWT_SECRET is still a placeholder value");
        }

        let admin_role_id = var("ADMIN_ROLE_ID")
            .map(|raw| {
                raw.parse::<i64>()
                    .with_context(|| format!("ADMIN_ROLE_ID is not a numeric id: {}", raw))
            })
            .transpose()?;

        let database_type = var("DATABASE_TYPE").unwrap_or_else(|| "sqlite".into());
        let storage = match database_type.to_lowercase().as_str() {
            "sqlite" => StorageConfig::Sqlite {
                path: var("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into()),
            },
            "remote" | "supabase" => {
                let url = var("REMOTE_STORE_URL")
                    .context("REMOTE_STORE_URL is required when DATABASE_TYPE=remote")?;
                let api_key = var("REMOTE_STORE_KEY")
                    .context("REMOTE_STORE_KEY is required when DATABASE_TYPE=remote")?;
                let timeout_secs = match var("REMOTE_STORE_TIMEOUT_SECS") {
                    Some(raw) => raw.parse::<u64>().with_context(|| {
                        format!("REMOTE_STORE_TIMEOUT_SECS is not a number: {}", raw)
                    })?,
                    None => DEFAULT_REMOTE_TIMEOUT_SECS,
                };
                StorageConfig::Remote {
                    url,
                    api_key,
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            other => bail!("DATABASE_TYPE must be sqlite or remote, got '{}'", other),
        };

        Ok(Self {
            host,
            port,
            jwt_secret,
            admin_role_id,
            storage,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
