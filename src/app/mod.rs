pub(crate) mod player;
pub(crate) mod playlist;
pub(crate) mod settings;
mod tui;


use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::json;

use crate::cli::{Cli, Command};
use crate::db::Database;
use crate::http;
use crate::paths;

use self::player::backend::BackendKind;
use self::playlist::Playlist;
use self::settings::{Quality, Settings};

pub fn run(cli: Cli) -> Result<()> {
    let mut db = open_db()?;
    match cli.command {
        Some(Command::Load { source, name, save }) => run_load(&mut db, &source, name, save),
        Some(Command::Open { name }) => run_open(&mut db, &name),
        Some(Command::List) => run_list(&db),
        Some(Command::Delete { name }) => run_delete(&db, &name),
        Some(Command::History { clear }) => run_history(&db, clear),
        Some(Command::Export { path }) => run_export(&db, path.as_deref()),
        Some(Command::Settings {
            autoplay,
            auto_advance,
            quality,
            player,
            clear_data,
        }) => run_settings(&db, autoplay, auto_advance, quality, player, clear_data),
        Some(Command::Tui) | None => run_default(&mut db),
    }
}

fn open_db() -> Result<Database> {
    let path = paths::database_file_path()?;
    let db = Database::open(&path)?;
    db.migrate()?;
    Ok(db)
}

fn run_load(db: &mut Database, source: &str, name: Option<String>, save: bool) -> Result<()> {
    let (text, derived_name) = read_source(source)?;
    let name = name.unwrap_or(derived_name);

    let entries = playlist::parse(&text);
    if entries.is_empty() {
        bail!("no channels found in `{source}`; is it an M3U playlist?");
    }
    let playlist = Playlist::new(name, entries);

    let mut is_saved = false;
    if save {
        db.save_playlist(&playlist)?;
        is_saved = true;
        println!(
            "Saved `{}` ({} channels).",
            playlist.name,
            playlist.entries.len()
        );
    }

    let autoplay = Settings::load(db).autoplay_on_load;
    tui::run_tui(db, playlist, is_saved, autoplay)
}

fn read_source(source: &str) -> Result<(String, String)> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read playlist from stdin")?;
        return Ok((text, "Pasted Playlist".to_string()));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        let text = http::fetch_playlist_text(source)
            .map_err(|err| anyhow::anyhow!("failed to fetch playlist: {err}"))?;
        return Ok((text, "Remote Playlist".to_string()));
    }
    let path = Path::new(source);
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read playlist file `{source}`"))?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Local Playlist".to_string());
    Ok((text, name))
}

fn run_open(db: &mut Database, name: &str) -> Result<()> {
    let Some(playlist) = db.load_playlist(name)? else {
        bail!("no saved playlist named `{name}`; run `flixtrack list` to see the library");
    };
    let autoplay = Settings::load(db).autoplay_on_load;
    tui::run_tui(db, playlist, true, autoplay)
}

fn run_default(db: &mut Database) -> Result<()> {
    let (playlist, is_saved) = match db.most_recent_playlist()? {
        Some(playlist) => (playlist, true),
        None => (Playlist::empty("No playlist loaded"), false),
    };
    tui::run_tui(db, playlist, is_saved, false)
}

fn run_list(db: &Database) -> Result<()> {
    let summaries = db.list_playlists()?;
    if summaries.is_empty() {
        println!("No saved playlists. Use `flixtrack load <source> --save` to add one.");
        return Ok(());
    }
    println!("{:<32} {:>8}  {}", "NAME", "CHANNELS", "SAVED");
    for summary in summaries {
        println!(
            "{:<32} {:>8}  {}",
            summary.name, summary.channels, summary.saved_at
        );
    }
    Ok(())
}

fn run_delete(db: &Database, name: &str) -> Result<()> {
    if db.delete_playlist(name)? {
        println!("Deleted `{name}`.");
    } else {
        println!("No saved playlist named `{name}`.");
    }
    Ok(())
}

fn run_history(db: &Database, clear: bool) -> Result<()> {
    if clear {
        db.clear_history()?;
        println!("Watch history cleared.");
        return Ok(());
    }
    let history = db.history()?;
    if history.is_empty() {
        println!("Watch history is empty.");
        return Ok(());
    }
    for item in history {
        println!("{}  {} [{}]", item.watched_at, item.entry.title, item.entry.group);
    }
    Ok(())
}

fn run_settings(
    db: &Database,
    autoplay: Option<bool>,
    auto_advance: Option<bool>,
    quality: Option<Quality>,
    player: Option<BackendKind>,
    clear_data: bool,
) -> Result<()> {
    if clear_data {
        db.clear_all_data()?;
        println!("All stored data cleared.");
        return Ok(());
    }

    let mut settings = Settings::load(db);
    if apply_settings_updates(&mut settings, autoplay, auto_advance, quality, player) {
        settings.save(db)?;
    }
    println!("autoplay on load  {}", on_off(settings.autoplay_on_load));
    println!("auto-advance      {}", on_off(settings.auto_advance));
    println!("quality           {}", settings.preferred_quality.label());
    println!("player            {}", settings.preferred_backend.label());
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Overwrite only the fields named by the caller. Returns whether anything
/// actually changed, so an unchanged read never rewrites the settings row.
pub(crate) fn apply_settings_updates(
    settings: &mut Settings,
    autoplay: Option<bool>,
    auto_advance: Option<bool>,
    quality: Option<Quality>,
    player: Option<BackendKind>,
) -> bool {
    let mut changed = false;
    if let Some(value) = autoplay
        && settings.autoplay_on_load != value
    {
        settings.autoplay_on_load = value;
        changed = true;
    }
    if let Some(value) = auto_advance
        && settings.auto_advance != value
    {
        settings.auto_advance = value;
        changed = true;
    }
    if let Some(value) = quality
        && settings.preferred_quality != value
    {
        settings.preferred_quality = value;
        changed = true;
    }
    if let Some(value) = player
        && settings.preferred_backend != value
    {
        settings.preferred_backend = value;
        changed = true;
    }
    changed
}

fn run_export(db: &Database, path: Option<&Path>) -> Result<()> {
    let mut playlists = Vec::new();
    for summary in db.list_playlists()? {
        if let Some(playlist) = db.load_playlist(&summary.name)? {
            playlists.push(playlist);
        }
    }
    let history: Vec<_> = db
        .history()?
        .into_iter()
        .map(|item| {
            json!({
                "entry": item.entry,
                "watched_at": item.watched_at,
            })
        })
        .collect();
    let bundle = json!({
        "playlists": playlists,
        "favorites": db.favorites()?,
        "history": history,
        "settings": Settings::load(db),
    });
    let text = serde_json::to_string_pretty(&bundle)?;
    match path {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write export to `{}`", path.display()))?;
            println!("Exported library to `{}`.", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
