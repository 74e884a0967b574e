use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Board API with JWT auth and file attachments")]
pub struct Args {
    /// Host to bind to (overrides BOARD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BOARD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides BOARD_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory where attachments are stored (overrides BOARD_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Secret used to sign access tokens (overrides BOARD_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds (overrides BOARD_TOKEN_TTL_SECS)
    #[arg(long)]
    pub token_ttl_secs: Option<i64>,

    /// Largest accepted request body in bytes (overrides BOARD_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values read through `lookup`, falling back to defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("BOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "BOARD_PORT", 5000u16)?;
        let env_db =
            lookup("BOARD_DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/board.db".into());
        let env_uploads = lookup("BOARD_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_secret = lookup("BOARD_JWT_SECRET").ok();
        let env_ttl = parse_var(&lookup, "BOARD_TOKEN_TTL_SECS", 3600i64)?;
        let env_max_upload = parse_var(&lookup, "BOARD_MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?;

        let jwt_secret = match args.jwt_secret.or(env_secret) {
            Some(secret) => secret,
            None => {
                tracing::warn!("BOARD_JWT_SECRET not set, using the development secret");
                DEFAULT_JWT_SECRET.into()
            }
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            upload_dir: args.upload_dir.unwrap_or(env_uploads),
            jwt_secret,
            token_ttl_secs: args.token_ttl_secs.unwrap_or(env_ttl),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
