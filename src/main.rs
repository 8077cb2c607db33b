mod cli;
mod config;
mod db;
mod engine;
mod models;
mod provider;
mod sink;
mod tui;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use cli::args::{Cli, Commands};
use cli::handlers;
use config::AppConfig;
use db::migrations::run_migrations;
use db::repository::{CacheRepo, MetaRepo};
use provider::SalahProvider;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    // Enable WAL mode for better concurrent access
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Run migrations on every startup
    run_migrations(&conn)?;

    match cli.command {
        // Setup wizard
        Some(Commands::Setup { reset }) => {
            handlers::handle_setup(&conn, &mut config, reset)?;
        }

        // Explicit subcommands — check setup first
        Some(cmd) => {
            ensure_setup(&conn, &mut config)?;
            match cmd {
                Commands::Times => {
                    handlers::handle_times(&conn, &config)?;
                }
                Commands::Next => {
                    handlers::handle_next(&conn, &config)?;
                }
                Commands::Mark { prayer } => {
                    handlers::handle_mark(&conn, &config, &prayer)?;
                }
                Commands::Alerts => {
                    handlers::handle_alerts(&conn, &config)?;
                }
                Commands::History => {
                    handlers::handle_history(&conn)?;
                }
                Commands::Remind { action } => {
                    handlers::handle_remind(&mut config, &action)?;
                }
                Commands::Setup { .. } => unreachable!(),
            }
        }

        // No subcommand → launch the dashboard
        None => {
            ensure_setup(&conn, &mut config)?;
            // Warm the cache for the coming week so ticks never block
            if let Ok(provider) = SalahProvider::from_config(&config.salah) {
                let today = chrono::Local::now().date_naive();
                let _ = CacheRepo::ensure_cached(&conn, &provider, today, 7);
            }
            tui::app::run(conn, config)?;
        }
    }

    Ok(())
}

/// Check if setup has been done; if not, run the wizard automatically.
fn ensure_setup(conn: &Connection, config: &mut AppConfig) -> Result<()> {
    let done = MetaRepo::get(conn, "setup_done")?;
    if done.as_deref() != Some("1") {
        eprintln!("No configuration found. Running setup...");
        eprintln!();
        handlers::handle_setup(conn, config, false)?;
    }
    Ok(())
}
