//! folio - terminal front end for folio accounts.
//!
//! Signs in against the folio backend, keeps the session in the configured
//! credential store, and issues authenticated API requests that refresh the
//! session transparently.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use folio_core::api::{ApiClient, ApiRequest, ReqwestTransport};
use folio_core::auth::{Navigator, SessionManager};
use folio_core::models::Registration;
use folio_core::{Config, StoreKind};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

const USAGE: &str = "\
Usage: folio [--ephemeral] <command> [args]

Global options:
  --ephemeral                Keep the session in memory only for this run

Commands:
  login [username]           Sign in with username and password
  register                   Create an account and sign in
  logout                     Forget the stored session
  status                     Show who is signed in
  google                     Start Google sign-in in the browser
  callback <url>             Finish Google sign-in with the redirect URL
  get <path>                 Authenticated GET, prints the JSON body
  delete <path>              Authenticated DELETE
  post <path> <json>         Authenticated POST with a JSON body
  put <path> <json>          Authenticated PUT with a JSON body

Options for get/delete/post/put:
  --scope <prefix>           Resolve <path> under a sub-API, e.g. /profile";

/// Navigator for a terminal: tell the user what to do next.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect_to_login(&self) {
        eprintln!("Your session has ended. Run `folio login` to sign in again.");
    }

    fn open_external(&self, url: &str) {
        eprintln!("Open this URL in your browser to continue:\n  {}", url);
        eprintln!("Then run `folio callback <redirect-url>` with the URL you land on.");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let (ephemeral, args) = take_flag(&raw_args, "--ephemeral");
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    if command == "-h" || command == "--help" || command == "help" {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    if ephemeral {
        config.store = StoreKind::Memory;
    }
    info!(api = %config.api_base_url, store = %config.store, "folio starting");

    let store = config.open_store()?;
    let transport = Arc::new(ReqwestTransport::new()?);
    let session = Arc::new(SessionManager::new(
        &config.api_base_url,
        store,
        transport,
        Arc::new(TerminalNavigator),
    ));

    match command.as_str() {
        "login" => login(&session, rest.first().cloned()).await,
        "register" => register(&session).await,
        "logout" => {
            session.logout();
            Ok(())
        }
        "status" => {
            status(&session);
            Ok(())
        }
        "google" => {
            session.begin_google_login();
            Ok(())
        }
        "callback" => callback(&session, rest),
        "get" | "delete" | "post" | "put" => request(&session, command, rest).await,
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("{} is required", label);
    }
    Ok(value)
}

fn prompt_password() -> Result<String> {
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

async fn login(session: &SessionManager, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt("Username")?,
    };
    let password = prompt_password()?;

    let user = session.login(&username, &password).await?;
    println!("Signed in as {} ({})", user.full_name, user.role);
    Ok(())
}

async fn register(session: &SessionManager) -> Result<()> {
    let registration = Registration {
        full_name: prompt("Full name")?,
        username: prompt("Username")?,
        email: prompt("Email")?,
        password: prompt_password()?,
    };

    let user = session.register(&registration).await?;
    println!("Account created. Signed in as {}", user.full_name);
    Ok(())
}

fn status(session: &SessionManager) {
    match session.current_user() {
        Some(user) => {
            println!("Signed in as {} <{}>", user.full_name, user.email);
            println!("Role: {}", user.role);
            if let Some(expiry) = session.expires_at() {
                println!("Access token expires {}", expiry.format("%Y-%m-%d %H:%M UTC"));
            }
            if session.refresh_token().is_none() {
                println!("No refresh token; sign in again when the access token expires");
            }
        }
        None => println!("Not signed in"),
    }
}

fn callback(session: &SessionManager, args: &[String]) -> Result<()> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("Usage: folio callback <redirect-url>"))?;
    let mut url = Url::parse(raw).context("Invalid redirect URL")?;

    let user = session.complete_google_login(&mut url)?;
    println!("Signed in as {} ({})", user.full_name, user.role);
    Ok(())
}

/// Remove every occurrence of `flag`, reporting whether it was present.
fn take_flag(args: &[String], flag: &str) -> (bool, Vec<String>) {
    let present = args.iter().any(|a| a == flag);
    let rest = args.iter().filter(|a| *a != flag).cloned().collect();
    (present, rest)
}

/// Split `--scope <prefix>` out of the positional arguments.
fn parse_request_args(args: &[String]) -> Result<(Option<String>, Vec<String>)> {
    let mut scope = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--scope" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--scope needs a prefix"))?;
            scope = Some(value.clone());
        } else {
            positional.push(arg.clone());
        }
    }
    Ok((scope, positional))
}

async fn request(session: &Arc<SessionManager>, method: &str, args: &[String]) -> Result<()> {
    let (scope, positional) = parse_request_args(args)?;
    let path = positional
        .first()
        .ok_or_else(|| anyhow!("Usage: folio {} <path>", method))?;

    let client = ApiClient::new(Arc::clone(session));
    let client = match scope {
        Some(ref prefix) => client.scoped(prefix),
        None => client,
    };

    let body = || -> Result<serde_json::Value> {
        let raw = positional
            .get(1)
            .ok_or_else(|| anyhow!("Usage: folio {} <path> <json>", method))?;
        serde_json::from_str(raw).context("Request body is not valid JSON")
    };

    let request = match method {
        "get" => ApiRequest::get(path),
        "delete" => ApiRequest::delete(path),
        "post" => ApiRequest::post(path, &body()?)?,
        "put" => ApiRequest::put(path, &body()?)?,
        other => bail!("Unsupported method: {}", other),
    };

    let response = client.send(request).await?;
    if !response.status.is_success() {
        bail!("{} {}: {}", response.status, path, response.body);
    }

    match serde_json::from_str::<serde_json::Value>(&response.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", response.body),
    }
    Ok(())
}
