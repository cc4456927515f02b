//! parcelwatch - a terminal client for tracking parcels.
//!
//! Runs the interactive TUI by default. A few flags provide one-shot
//! commands for scripting (see `USAGE`).

mod app;
mod ui;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parcelwatch_core::config::{ENV_PASSWORD, ENV_USERNAME};
use parcelwatch_core::models::{Package, TrackingInfo};
use parcelwatch_core::utils::{format_optional, truncate_string};
use parcelwatch_core::{ApiClient, Config};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Daily log files are named `parcelwatch.log.YYYY-MM-DD` in the cache dir.
const LOG_FILE_PREFIX: &str = "parcelwatch.log";

const USAGE: &str = "\
Usage: parcelwatch [COMMAND]

Without a command the interactive terminal UI starts.

Commands:
  --login         Log in and store the session
  --logout        Forget the stored session
  --list          Print your packages
  --track <ID>    Print a package and its tracking history as JSON
  -h, --help      Show this help

Environment:
  PARCELWATCH_API_URL        API base URL (default http://localhost:8000)
  PARCELWATCH_USERNAME       Username for login
  PARCELWATCH_PASSWORD       Password for login
  PARCELWATCH_TOKEN_STORAGE  file, keyring or memory
  RUST_LOG                   Log filter (default warn)";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Tui,
    Login,
    Logout,
    List,
    Track(i64),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Tui);
    };
    let command = match first.as_str() {
        "--login" => Command::Login,
        "--logout" => Command::Logout,
        "--list" => Command::List,
        "-h" | "--help" => Command::Help,
        "--track" => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow!("--track requires a package id"))?;
            let id = id
                .parse()
                .with_context(|| format!("Invalid package id: {}", id))?;
            return Ok(Command::Track(id));
        }
        other => bail!("Unknown argument: {}", other),
    };
    if args.len() > 1 {
        bail!("Unexpected argument: {}", args[1]);
    }
    Ok(command)
}

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to a daily file while the TUI owns the terminal.
fn init_file_tracing(config: &Config) -> Option<WorkerGuard> {
    let dir = match config.cache_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Logging disabled: {}", e);
            return None;
        }
    };
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Some(guard)
}

/// One-shot commands log to stderr so stdout stays clean for output.
fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {:#}", e);
        Config::default()
    });
    config.apply_env();

    let _guard = if command == Command::Tui {
        init_file_tracing(&config)
    } else {
        init_stderr_tracing();
        None
    };

    let session = config.open_session()?;
    let api = ApiClient::from_config(&config, session)?;

    match command {
        Command::Tui => run_tui(config, api).await,
        Command::Login => login(config, &api).await,
        Command::Logout => {
            api.logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::List => list(&api).await,
        Command::Track(id) => track(&api, id).await,
        Command::Help => Ok(()),
    }
}

// ============================================================================
// One-shot commands
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(mut config: Config, api: &ApiClient) -> Result<()> {
    let username = match std::env::var(ENV_USERNAME) {
        Ok(username) => username,
        Err(_) => {
            let default = config.last_username.clone().unwrap_or_default();
            let label = if default.is_empty() {
                "Username: ".to_string()
            } else {
                format!("Username [{}]: ", default)
            };
            let entered = prompt(&label)?;
            if entered.is_empty() {
                default
            } else {
                entered
            }
        }
    };
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    api.login(&username, &password)
        .await
        .map_err(|e| anyhow!(e.user_message("Login failed")))?;

    if let Err(e) = config.remember_username(username.trim()) {
        warn!(error = %e, "Failed to save config");
    }
    println!("Logged in as {}", username.trim());
    Ok(())
}

fn require_login(api: &ApiClient) -> Result<()> {
    if !api.session().is_authenticated() {
        bail!("Not logged in. Run `parcelwatch --login` first.");
    }
    Ok(())
}

fn package_row(package: &Package) -> String {
    format!(
        "{:>5}  {:<24}  {:<8}  {:<28}  {}",
        package.id,
        truncate_string(&package.tracking_number, 24),
        package.carrier_display(),
        truncate_string(package.display_name(), 28),
        format_optional(package.status_line().as_deref(), "-"),
    )
}

async fn list(api: &ApiClient) -> Result<()> {
    require_login(api)?;
    let packages = api
        .list_packages()
        .await
        .map_err(|e| anyhow!(e.user_message("Failed to load packages")))?;

    if packages.is_empty() {
        println!("No packages yet");
        return Ok(());
    }
    println!(
        "{:>5}  {:<24}  {:<8}  {:<28}  {}",
        "ID", "TRACKING NUMBER", "CARRIER", "PACKAGE", "STATUS"
    );
    for package in &packages {
        println!("{}", package_row(package));
    }
    Ok(())
}

#[derive(Serialize)]
struct TrackOutput {
    package: Package,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking: Option<TrackingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_error: Option<String>,
}

async fn track(api: &ApiClient, id: i64) -> Result<()> {
    require_login(api)?;
    let (package, tracking) =
        futures::future::join(api.get_package(id), api.track_package(id)).await;
    let package = package.map_err(|e| anyhow!(e.user_message("Failed to load package details")))?;

    let output = match tracking {
        Ok(mut info) => {
            info.history = info.sorted_history();
            TrackOutput {
                package,
                tracking: Some(info),
                tracking_error: None,
            }
        }
        Err(e) if e.is_unauthorized() => bail!(e.user_message("Please log in again")),
        Err(e) => TrackOutput {
            package,
            tracking: None,
            tracking_error: Some(e.user_message("Tracking information is unavailable")),
        },
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================================================
// Interactive UI
// ============================================================================

async fn run_tui(config: Config, api: ApiClient) -> Result<()> {
    info!(base_url = %config.api_base(), "parcelwatch starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, api);
    app.start();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("parcelwatch shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(&[]).unwrap(), Command::Tui);
        assert_eq!(parse_args(&args(&["--login"])).unwrap(), Command::Login);
        assert_eq!(parse_args(&args(&["--logout"])).unwrap(), Command::Logout);
        assert_eq!(parse_args(&args(&["--list"])).unwrap(), Command::List);
        assert_eq!(parse_args(&args(&["-h"])).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["--track", "42"])).unwrap(), Command::Track(42));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--track"])).is_err());
        assert!(parse_args(&args(&["--track", "abc"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert!(parse_args(&args(&["--list", "extra"])).is_err());
    }

    #[test]
    fn test_package_row() {
        let package = Package {
            id: 7,
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: Some("ups".to_string()),
            description: Some("Books".to_string()),
            status: Some("In transit".to_string()),
            last_location: None,
            created_at: None,
            updated_at: None,
        };
        let row = package_row(&package);
        assert!(row.starts_with("    7  1Z999AA10123456784"));
        assert!(row.contains("UPS"));
        assert!(row.contains("Books"));
        assert!(row.ends_with("In transit"));
    }
}
