use std::time::Duration;

use clap::{Parser, Subcommand};
use rental_admin::auth::claims::decode_claims;
use rental_admin::auth::form::{login_failure_message, validate_login_input};
use rental_admin::auth::token_store::MemoryTokenStore;
use rental_admin::auth::transport::TransportError;
use rental_admin::config::ConfigError;
use rental_admin::{AuthConfig, AuthContext, AuthService};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("missing password; pass --password or set ADMIN_PASSWORD")]
    MissingPassword,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("login failed ({code}): {message}")]
    Login { code: &'static str, message: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "rental-admin", about = "Rental admin panel session tools")]
struct Cli {
    #[arg(long, env = "ADMIN_LOGIN_URL")]
    login_url: Option<String>,

    #[arg(long, env = "ADMIN_LOGIN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in as an admin and print the session user and bearer header.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print the advisory claims carried by a token. Nothing is verified.
    Decode { token: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let config = resolve_config(AuthConfig::from_env()?, cli.login_url, cli.timeout_secs);

    match cli.command {
        Command::Login { email, password } => run_login(&config, &email, password).await,
        Command::Decode { token } => run_decode(&token),
    }
}

fn resolve_config(base: AuthConfig, login_url: Option<String>, timeout_secs: Option<u64>) -> AuthConfig {
    let mut config = base;
    if let Some(url) = login_url {
        config = config.with_login_url(url);
    }
    if let Some(secs) = timeout_secs.filter(|secs| *secs > 0) {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

async fn run_login(config: &AuthConfig, email: &str, password: Option<String>) -> Result<(), CliError> {
    let password = password.ok_or(CliError::MissingPassword)?;
    let credentials = validate_login_input(email, &password).map_err(CliError::InvalidInput)?;

    let service = AuthService::from_config(config, MemoryTokenStore::new())?;
    let session = AuthContext::new(service);
    session.resolve();

    let response = session
        .login(&credentials)
        .await
        .map_err(|e| CliError::Login { code: e.code(), message: login_failure_message(&e) })?;

    print_json(&json!({
        "user": response.user,
        "authorization": session.service().authorization_header(),
    }))
}

fn run_decode(token: &str) -> Result<(), CliError> {
    match decode_claims(token) {
        Some(claims) => print_json(&serde_json::to_value(claims)?),
        None => {
            println!("no claims");
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
