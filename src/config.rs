use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;

use crate::models::user::{MODE_READ, MODE_READ_WRITE};

/// Secret used when MEDIA_CONSOLE_AUTH_SECRET is unset. main() warns
/// whenever this one is in effect.
pub const DEFAULT_AUTH_SECRET: &str = "media-console-dev-secret";
/// Account list used when MEDIA_CONSOLE_ACCOUNTS is unset.
pub const DEFAULT_ACCOUNTS: &str = "admin@local:admin";

/// A provisioned sign-in account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
    /// Permission bits (read 4, write 2).
    pub mode: u8,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Base URL media and thumbnails are served under.
    pub public_url: String,
    pub auth_secret: String,
    pub session_ttl_minutes: i64,
    pub accounts: Vec<AccountConfig>,
    /// Pre-issued bearer tokens accepted without sign-in.
    pub auth_tokens: Vec<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Media management console API")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_CONSOLE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_CONSOLE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where media blobs are stored (overrides MEDIA_CONSOLE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides MEDIA_CONSOLE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL for served media (overrides MEDIA_CONSOLE_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Secret for signing session tokens (overrides MEDIA_CONSOLE_AUTH_SECRET)
    #[arg(long)]
    pub auth_secret: Option<String>,

    /// Session lifetime in minutes (overrides MEDIA_CONSOLE_SESSION_TTL_MINUTES)
    #[arg(long)]
    pub session_ttl_minutes: Option<i64>,

    /// Accounts as `email:password[:ro|rw]`, comma-separated
    /// (overrides MEDIA_CONSOLE_ACCOUNTS)
    #[arg(long)]
    pub accounts: Option<String>,

    /// Pre-issued bearer tokens, comma-separated
    /// (overrides MEDIA_CONSOLE_AUTH_TOKENS)
    #[arg(long)]
    pub auth_tokens: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("MEDIA_CONSOLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("MEDIA_CONSOLE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing MEDIA_CONSOLE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading MEDIA_CONSOLE_PORT"),
        };
        let env_storage =
            env::var("MEDIA_CONSOLE_STORAGE_DIR").unwrap_or_else(|_| "./data/media".into());
        let env_db = env::var("MEDIA_CONSOLE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/media_console.db".into());
        let env_public = env::var("MEDIA_CONSOLE_PUBLIC_URL").ok();
        let env_secret =
            env::var("MEDIA_CONSOLE_AUTH_SECRET").unwrap_or_else(|_| DEFAULT_AUTH_SECRET.into());
        let env_ttl = match env::var("MEDIA_CONSOLE_SESSION_TTL_MINUTES") {
            Ok(value) => value.parse::<i64>().with_context(|| {
                format!("parsing MEDIA_CONSOLE_SESSION_TTL_MINUTES value `{}`", value)
            })?,
            Err(env::VarError::NotPresent) => 720,
            Err(err) => return Err(err).context("reading MEDIA_CONSOLE_SESSION_TTL_MINUTES"),
        };
        let env_accounts =
            env::var("MEDIA_CONSOLE_ACCOUNTS").unwrap_or_else(|_| DEFAULT_ACCOUNTS.into());
        let env_tokens = env::var("MEDIA_CONSOLE_AUTH_TOKENS").unwrap_or_default();

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_url = args
            .public_url
            .or(env_public)
            .unwrap_or_else(|| format!("http://localhost:{}", port));
        let accounts = parse_accounts(&args.accounts.unwrap_or(env_accounts))?;
        let auth_tokens = parse_token_list(&args.auth_tokens.unwrap_or(env_tokens));

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_url,
            auth_secret: args.auth_secret.unwrap_or(env_secret),
            session_ttl_minutes: args.session_ttl_minutes.unwrap_or(env_ttl),
            accounts,
            auth_tokens,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated `email:password[:ro|rw]` account list.
pub fn parse_accounts(raw: &str) -> Result<Vec<AccountConfig>> {
    let mut accounts = Vec::new();
    for spec in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = spec.splitn(3, ':');
        let email = parts.next().unwrap_or_default().trim();
        let password = parts.next().unwrap_or_default().trim();
        let mode = match parts.next().map(str::trim) {
            None | Some("rw") => MODE_READ_WRITE,
            Some("ro") => MODE_READ,
            Some(other) => bail!("unknown account mode `{}` in `{}`", other, spec),
        };
        if email.is_empty() || password.is_empty() {
            bail!("account spec `{}` must look like email:password[:ro|rw]", spec);
        }
        accounts.push(AccountConfig {
            email: email.to_string(),
            password: password.to_string(),
            mode,
        });
    }
    Ok(accounts)
}

fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_accounts_with_optional_mode() {
        let accounts = parse_accounts("a@x:pw, b@x:pw2:ro, c@x:pw3:rw").unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0].email, "a@x");
        assert_eq!(accounts[0].mode, MODE_READ_WRITE);
        assert_eq!(accounts[1].mode, MODE_READ);
        assert_eq!(accounts[2].mode, MODE_READ_WRITE);
    }

    #[test]
    fn rejects_malformed_account_specs() {
        assert!(parse_accounts("no-password").is_err());
        assert!(parse_accounts("a@x:pw:admin").is_err());
    }

    #[test]
    fn token_list_skips_blanks() {
        let tokens = parse_token_list("tok-1, ,tok-2,");
        assert_eq!(tokens, vec!["tok-1".to_string(), "tok-2".to_string()]);
    }
}
