//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Fundlift",
    about = "Crowdfunding service with dual-token session authentication"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "fundlift.db")]
    pub database: String,

    /// Access token lifetime in minutes
    #[arg(long, default_value = "5")]
    pub access_ttl_minutes: u64,

    /// Refresh token lifetime in days
    #[arg(long, default_value = "7")]
    pub refresh_ttl_days: u64,

    /// Path to file containing the access-token signing secret.
    /// Prefer using the ACCESS_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh-token signing secret.
    /// Prefer using the REFRESH_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Do not set the Secure flag on session cookies (local HTTP
    /// development only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// The two token-signing secrets, loaded at startup.
pub struct SigningSecrets {
    pub access: Vec<u8>,
    pub refresh: Vec<u8>,
}

/// Load one signing secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded - there
/// is deliberately no fallback value of any kind.
fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking.
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or pass a secret file",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. Absence of either is fatal to startup.
pub fn load_signing_secrets(args: &Args) -> Option<SigningSecrets> {
    let access = load_secret("ACCESS_SECRET", args.access_secret_file.as_deref())?;
    let refresh = load_secret("REFRESH_SECRET", args.refresh_secret_file.as_deref())?;

    if access == refresh {
        error!("ACCESS_SECRET and REFRESH_SECRET must be different secrets");
        return None;
    }

    Some(SigningSecrets {
        access: access.into_bytes(),
        refresh: refresh.into_bytes(),
    })
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, secrets: SigningSecrets) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: secrets.access,
        refresh_secret: secrets.refresh,
        access_ttl: Duration::from_secs(args.access_ttl_minutes * 60),
        refresh_ttl: Duration::from_secs(args.refresh_ttl_days * 24 * 60 * 60),
        secure_cookies: !args.insecure_cookies,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
