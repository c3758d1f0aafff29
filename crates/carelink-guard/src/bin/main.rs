//! CareLink session CLI
//!
//! Inspects and manipulates the credentials a CareLink session keeps on
//! disk. Each invocation is a separate process, so the access token is
//! persisted alongside the refresh token.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use carelink_guard::{GuardPolicy, GuardState, HttpProfileClient, RouteGuard};
use carelink_session::{default_storage_dir, AuthSession, SettingsManager};

/// CareLink session credentials
#[derive(Parser, Debug)]
#[command(name = "carelink-auth")]
#[command(version)]
#[command(about = "Inspect and manage CareLink session credentials")]
struct Args {
    /// Directory holding settings and credential stores
    #[arg(long, env = "CARELINK_STORAGE_DIR", global = true)]
    storage_dir: Option<PathBuf>,

    /// Backend base URL (overrides settings)
    #[arg(long, env = "CARELINK_BACKEND_URL", global = true)]
    backend_url: Option<String>,

    /// Application origin (overrides settings)
    #[arg(long, env = "CARELINK_APP_ORIGIN", global = true)]
    app_origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show authentication and migration state
    Info,

    /// Store a token pair from a login response
    Login {
        #[arg(long, env = "CARELINK_ACCESS_TOKEN", hide_env_values = true)]
        access: String,
        #[arg(long, env = "CARELINK_REFRESH_TOKEN", hide_env_values = true)]
        refresh: String,
    },

    /// Apply a Set-Cookie header received from the backend
    AcceptCookie {
        /// Raw header value, e.g. `carelink_refresh=...; Path=/; Secure`
        header: String,
    },

    /// Clear credentials from every store
    Logout,

    /// Run a route guard check against the backend
    Guard {
        /// Allowed profile roles
        #[arg(long = "role", required_unless_present = "superuser")]
        roles: Vec<String>,

        /// Require superuser instead of a role
        #[arg(long, conflicts_with = "roles")]
        superuser: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage_dir = match args.storage_dir {
        Some(dir) => dir,
        None => default_storage_dir()?,
    };

    let manager = SettingsManager::new(&storage_dir);
    let mut settings = manager.get().clone();
    settings.storage_dir = Some(storage_dir);
    settings.persist_access_token = true;
    if let Some(url) = args.backend_url {
        settings.backend.base_url = url;
    }
    if let Some(origin) = args.app_origin {
        settings.app_origin = origin;
    }

    let session = AuthSession::bootstrap(settings).context("Failed to open session storage")?;
    let coordinator = session.coordinator();

    match args.command {
        Command::Info => {
            let manager = coordinator.get_current_manager();
            let cookies: Vec<String> = session
                .cookie_jar()
                .records()
                .await
                .into_iter()
                .map(|record| record.name)
                .collect();

            let keys = manager.keys();
            let stores = manager.stores();
            let report = json!({
                "strategy": coordinator.strategy().to_string(),
                "keys": {"access": keys.access, "refresh": keys.refresh},
                "backends": {
                    "access": stores.ephemeral.backend_name(),
                    "cookie": stores.cookie.backend_name(),
                    "local": stores.local.backend_name(),
                },
                "tokenInfo": manager.get_token_info().await,
                "migration": coordinator.get_migration_info().await,
                "cookies": cookies,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Login { access, refresh } => {
            coordinator
                .get_current_manager()
                .set_tokens(&access, &refresh)
                .await;
            info!("Stored tokens using {} strategy", coordinator.strategy());
        }

        Command::AcceptCookie { header } => {
            session
                .cookie_jar()
                .accept_set_cookie(&header)
                .await
                .context("Cookie not accepted")?;
        }

        Command::Logout => {
            session.logout().await;
        }

        Command::Guard { roles, superuser } => {
            let policy = if superuser {
                GuardPolicy::Superuser
            } else {
                GuardPolicy::Roles(roles)
            };

            let client = HttpProfileClient::new(&session.settings().backend)?;
            let guard = RouteGuard::new(coordinator, Arc::new(client), policy)
                .with_redirect(session.settings().login_redirect.clone());

            let state = guard.check().await;
            let mut report = serde_json::to_value(&state)?;
            if let Some(target) = guard.redirect_for(&state) {
                report["redirect"] = json!(target);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);

            if state != GuardState::Authorized {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
