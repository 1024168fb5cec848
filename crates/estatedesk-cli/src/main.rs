//! estatedesk - command-line front end for the listings app session.
//!
//! Signs in, registers, inspects the current user and walks the app's route
//! table the way the browser would, redirects included.

mod prompt;
mod routes;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use estatedesk_core::api::ApiClient;
use estatedesk_core::auth::HttpCredentialService;
use estatedesk_core::cache::CredentialCache;
use estatedesk_core::models::Registration;
use estatedesk_core::utils::format_phone;
use estatedesk_core::{Config, SessionStore};

use prompt::{MAX_PHONE_LENGTH, MAX_TEXT_LENGTH};
use routes::{follow, AppRoutes, Resolution};

// ============================================================================
// Constants
// ============================================================================

const EMAIL_ENV: &str = "ESTATEDESK_EMAIL";
const PASSWORD_ENV: &str = "ESTATEDESK_PASSWORD";

/// Log file written next to the credential cache
const LOG_FILE: &str = "estatedesk.log";

/// Redirect hops `open` follows before giving up
const MAX_REDIRECTS: usize = 5;

const USAGE: &str = "\
Usage: estatedesk <command>

Commands:
  login [email]   Sign in (password from ESTATEDESK_PASSWORD or prompt)
  register        Create an account and sign in
  logout          Sign out and forget the stored session
  whoami          Show the signed-in user
  refresh         Re-fetch the signed-in user's profile
  open <path>     Show what the app renders at <path>
  routes          List routes and who may see them";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=estatedesk_core=debug).
/// The returned guard flushes the file log on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = log_dir
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .map(|dir| tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE)));
    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let loaded = Config::load();
    let log_dir = Config::default().cache_dir().ok();
    let _log_guard = init_tracing(log_dir.as_deref());

    let mut config = loaded.unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config");
        Config::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    match command {
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            return Ok(());
        }
        "routes" => {
            print_routes();
            return Ok(());
        }
        _ => {}
    }

    let (session, cache) = open_session(&config)?;
    session.bootstrap().await;

    match command {
        "login" => login(&session, &mut config, args.get(1).map(String::as_str)).await,
        "register" => register(&session, &mut config).await,
        "logout" => {
            session.logout().await;
            println!("Signed out.");
            Ok(())
        }
        "whoami" => whoami(&session, &cache),
        "refresh" => refresh(&session).await,
        "open" => match args.get(1) {
            Some(path) => open(&session, path),
            None => bail!("Usage: estatedesk open <path>"),
        },
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

/// Wire the credential store, HTTP service and session together.
fn open_session(config: &Config) -> Result<(SessionStore, CredentialCache)> {
    let cache = CredentialCache::new(config.credential_store()?);
    let api = ApiClient::new(config.api_base_url())?;
    info!(base_url = %api.base_url(), backend = ?config.credential_backend, "Opening session");

    let service = Arc::new(HttpCredentialService::new(api, cache.clone()));
    Ok((SessionStore::new(service, cache.clone()), cache))
}

async fn login(session: &SessionStore, config: &mut Config, email_arg: Option<&str>) -> Result<()> {
    if let Some(user) = session.snapshot().user {
        println!("Already signed in as {}. Run `estatedesk logout` first.", user.email);
        return Ok(());
    }

    let email = match email_arg
        .map(str::to_string)
        .or_else(|| std::env::var(EMAIL_ENV).ok())
    {
        Some(email) => prompt::sanitize(&email, MAX_TEXT_LENGTH)?,
        None => prompt::prompt_line("Email", config.last_email.as_deref(), MAX_TEXT_LENGTH)?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => prompt::sanitize_password(&password)?,
        Err(_) => prompt::prompt_password("Password")?,
    };

    let user = session.login(&email, &password).await?;
    println!("Welcome, {}!", user.first_name());
    remember_email(config, user.email);
    Ok(())
}

async fn register(session: &SessionStore, config: &mut Config) -> Result<()> {
    if let Some(user) = session.snapshot().user {
        println!("Already signed in as {}. Run `estatedesk logout` first.", user.email);
        return Ok(());
    }

    let name = prompt::prompt_line("Name", None, MAX_TEXT_LENGTH)?;
    let email = prompt::prompt_line("Email", None, MAX_TEXT_LENGTH)?;
    let phone = prompt::prompt_line("Phone (optional)", None, MAX_PHONE_LENGTH)?;
    let password = prompt::prompt_password("Password")?;
    if prompt::prompt_password("Confirm password")? != password {
        bail!("Passwords do not match");
    }

    let registration = Registration::new(name, email, password, phone);
    let user = session.register(&registration).await?;
    println!("Account created. Welcome, {}!", user.first_name());
    remember_email(config, user.email);
    Ok(())
}

fn remember_email(config: &mut Config, email: String) {
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn whoami(session: &SessionStore, cache: &CredentialCache) -> Result<()> {
    let state = session.snapshot();
    let Some(user) = state.user.filter(|_| state.is_authenticated) else {
        println!("Not signed in.");
        return Ok(());
    };

    println!("{} <{}>", user.name, user.email);
    println!("  role:  {}", user.role);
    if let Some(ref phone) = user.phone {
        println!("  phone: {}", format_phone(phone));
    }
    if let Some(cached) = cache.cached_user() {
        println!("  profile cached {}", cached.age_display());
    }
    Ok(())
}

async fn refresh(session: &SessionStore) -> Result<()> {
    match session.refresh_user().await? {
        Some(user) => println!("Profile refreshed: {} ({})", user.name, user.role),
        None => println!("Not signed in."),
    }
    Ok(())
}

/// Resolve `path` against the route table, following redirects.
fn open(session: &SessionStore, path: &str) -> Result<()> {
    let routes = AppRoutes::new();
    let state = session.snapshot();
    let mut location = path.to_string();

    for _ in 0..=MAX_REDIRECTS {
        match routes.resolve(&state, &location) {
            Resolution::Screen(screen) => {
                println!("{} -> {}", location, screen.title());
                return Ok(());
            }
            Resolution::Waiting => {
                println!("Loading session…");
                return Ok(());
            }
            Resolution::Redirect(redirect) => {
                let next = follow(&redirect);
                println!("{} redirects to {}", location, next);
                location = next;
            }
            Resolution::NotFound => bail!("Nothing is routed at {}", location),
        }
    }
    bail!("Too many redirects starting from {}", path)
}

fn print_routes() {
    for (path, access) in AppRoutes::new().describe() {
        println!("{:<16} {}", path, access);
    }
}
