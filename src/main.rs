use std::io;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod app;
mod config;
mod db;
mod error;
mod fetch;
mod models;
mod sync;
mod tui;

use app::App;
use config::Config;
use error::{AppError, Result};
use tui::{draw, handle_key_event};

const USAGE: &str = "Usage: subkeeper [--add <url> [name] | --refresh | --list | --delete <id> | --export <identifier> <path>]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    // Initialize app
    let mut app = App::new(&config).await?;

    // Headless modes run one engine operation and exit
    if args.len() >= 2 {
        return run_headless(&mut app, &args[1..]).await;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
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

    Ok(())
}

async fn run_headless(app: &mut App, args: &[String]) -> Result<()> {
    match args {
        [flag, url, rest @ ..] if flag == "--add" && rest.len() <= 1 => {
            let name = rest.first().map(String::as_str).unwrap_or("");
            let created = app.engine.create(name, url).await?;
            println!("Added {} ({})", created.name, created.identifier);
        }
        [flag] if flag == "--refresh" => {
            let count = app.engine.refresh_all().await?;
            println!(
                "Refreshed {} of {} subscriptions",
                count,
                app.engine.subscriptions().len()
            );
        }
        [flag] if flag == "--list" => {
            println!("{}", serde_json::to_string_pretty(app.engine.subscriptions())?);
        }
        [flag, id] if flag == "--delete" => {
            let id: i64 = id
                .parse()
                .map_err(|_| AppError::Validation(format!("not a subscription id: {id}")))?;
            if app.engine.delete(id).await? {
                println!("Deleted subscription {}", id);
            } else {
                println!("No subscription with id {}", id);
            }
        }
        [flag, identifier, path] if flag == "--export" => {
            let content = app
                .engine
                .config_content(identifier)
                .await?
                .ok_or_else(|| AppError::Validation(format!("unknown subscription {identifier}")))?;
            std::fs::write(path, content)?;
            println!("Exported {} to {}", identifier, path);
        }
        _ => {
            eprintln!("{USAGE}");
            return Err(AppError::Config(format!("unrecognised arguments: {}", args.join(" "))));
        }
    }
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Run queued work now that its "syncing" state is on screen
        if app.has_pending_sync() {
            app.run_pending_sync().await;
            continue;
        }

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.input_mode, app.show_help) {
                        let should_quit = app.handle_action(action).await?;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
