use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::player::backend::BackendKind;
use crate::app::settings::Quality;

#[derive(Debug, Parser)]
#[command(
    name = "flixtrack",
    version,
    about = "Terminal M3U playlist player with watch history, resume and player failover"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a playlist from a URL, a file path, or `-` for stdin, then open the player
    Load {
        source: String,
        /// Name for the loaded playlist (defaults to the file stem or a generic name)
        #[arg(long)]
        name: Option<String>,
        /// Save the playlist to the library before opening it
        #[arg(long)]
        save: bool,
    },
    /// Open a saved playlist from the library
    Open { name: String },
    /// List saved playlists
    List,
    /// Delete a saved playlist
    Delete { name: String },
    /// Show the watch history
    History {
        /// Clear the watch history instead of showing it
        #[arg(long)]
        clear: bool,
    },
    /// Export playlists, favorites, history and settings as a JSON bundle
    Export { path: Option<PathBuf> },
    /// Show stored settings, or change the ones named by flags
    Settings {
        /// Start playback automatically after `load` and `open` (true/false)
        #[arg(long)]
        autoplay: Option<bool>,
        /// Advance to the next channel when playback ends cleanly (true/false)
        #[arg(long)]
        auto_advance: Option<bool>,
        /// Preferred stream quality hint
        #[arg(long, value_enum)]
        quality: Option<Quality>,
        /// Preferred player backend
        #[arg(long, value_enum)]
        player: Option<BackendKind>,
        /// Delete all stored playlists, favorites, history, resume positions
        /// and settings
        #[arg(long)]
        clear_data: bool,
    },
    /// Open the player on the most recently saved playlist
    Tui,
}
