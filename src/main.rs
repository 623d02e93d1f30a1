//! Vanguard: headless driver.
//!
//! Exercises the engine end to end without the desktop shell: signs in,
//! refreshes the library, prints the dashboard summary and the top of the
//! vault, and optionally runs one genre-scan invocation.
//!
//! Configuration comes from the environment:
//! - `VANGUARD_API_BASE`  companion proxy base URL (default
//!   `http://localhost:3001/api`)
//! - `VANGUARD_STEAM_ID` / `VANGUARD_API_KEY`  credentials; when unset, the
//!   previously stored session is reused.

use anyhow::{ensure, Result};
use std::env;
use vanguard::model::format_minutes;
use vanguard::vault::VaultState;
use vanguard::{ApiClient, App, FileStore};

const DEFAULT_API_BASE: &str = "http://localhost:3001/api";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let base = env::var("VANGUARD_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let store = FileStore::open_default()?;
    let mut app = App::new(ApiClient::new(base)?, Box::new(store))?;

    if let (Ok(steam_id), Ok(api_key)) = (env::var("VANGUARD_STEAM_ID"), env::var("VANGUARD_API_KEY")) {
        app.sign_in(&steam_id, &api_key).await?;
    }
    ensure!(
        app.is_signed_in(),
        "no session: set VANGUARD_STEAM_ID and VANGUARD_API_KEY"
    );

    app.refresh().await?;

    if let Some(profile) = app.profile() {
        println!("Operator: {}", profile.personaname);
    }
    let stats = app.stats();
    println!(
        "Library: {} games, {} total",
        stats.game_count,
        format_minutes(stats.total_minutes.min(u64::from(u32::MAX)) as u32)
    );
    if let Some(top) = &stats.top_game {
        println!("Primary focus: {top}");
    }
    let classification = app.classification().clone();
    println!(
        "Mastered: {}  Hunter targets: {}  Blacklisted: {}",
        classification.mastered.len(),
        classification.hunter.len(),
        app.blacklist().len()
    );

    println!("\nVault (by engagement):");
    let view = app.vault(&VaultState::default());
    for game in view.games().take(10) {
        let marker = if classification.is_mastered(game.appid) {
            "★"
        } else if classification.is_hunter(game.appid) {
            "◐"
        } else {
            " "
        };
        println!("  {marker} {:<40} {}", game.name, format_minutes(game.playtime_forever));
    }
    println!("  ({} games total)", view.total);

    match app.squadron().await {
        Ok(friends) => {
            let online = friends.iter().filter(|f| f.personastate.is_online()).count();
            let in_game = friends.iter().filter(|f| f.gameextrainfo.is_some()).count();
            println!("\nSquadron: {online} online, {in_game} in game");
        }
        Err(e) => log::warn!("squadron unavailable: {e}"),
    }

    if env::args().any(|arg| arg == "scan") {
        println!("\nScanning store metadata...");
        match app.scan_genres().await {
            Some(outcome) => println!(
                "Scanned {} games ({} failed); {} genres known",
                outcome.fetched.len(),
                outcome.failed.len(),
                outcome.vocabulary.len()
            ),
            None => println!("A scan is already in progress."),
        }
    }

    if env::args().any(|arg| arg == "clear-cache") {
        app.clear_metadata_cache()?;
        println!("Store metadata cache cleared.");
    }

    Ok(())
}
