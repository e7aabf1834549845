use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Default per-file upload ceiling for the file manager (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default ceiling for a whole multipart upload request (512 MiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 512 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub max_upload_bytes: usize,
    pub max_request_bytes: usize,
    pub public_base_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "School file manager and exam import service")]
pub struct Args {
    /// Host to bind to (overrides CLASSDRIVE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CLASSDRIVE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where file blobs are stored (overrides CLASSDRIVE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides CLASSDRIVE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Largest accepted upload in bytes (overrides CLASSDRIVE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Largest accepted multipart upload request in bytes, all files together
    /// (overrides CLASSDRIVE_MAX_REQUEST_BYTES)
    #[arg(long)]
    pub max_request_bytes: Option<usize>,

    /// Base URL prefixed to blob keys in responses (overrides CLASSDRIVE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("CLASSDRIVE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("CLASSDRIVE_PORT", 3000u16)?;
        let env_storage =
            env::var("CLASSDRIVE_STORAGE_DIR").unwrap_or_else(|_| "./data/blobs".into());
        let env_db = env::var("CLASSDRIVE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/classdrive.db".into());
        let env_max_upload = parse_env("CLASSDRIVE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let env_max_request =
            parse_env("CLASSDRIVE_MAX_REQUEST_BYTES", DEFAULT_MAX_REQUEST_BYTES)?;
        let env_public = env::var("CLASSDRIVE_PUBLIC_BASE_URL").ok();

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or(env_public)
            .unwrap_or_else(|| format!("http://{}:{}/blobs", host, port));

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            max_request_bytes: args.max_request_bytes.unwrap_or(env_max_request),
            public_base_url,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
