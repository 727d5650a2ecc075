mod actions;
mod render;
mod session;

use std::collections::HashSet;
use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::app::player::{NoticeLevel, PlayerController, RESUME_THRESHOLD_SECS};
use crate::app::playlist::Playlist;
use crate::app::settings::Settings;
use crate::db::Database;

use self::actions::{
    clamp_selection, cycle_group, group_names, status_error, status_info, truncate,
    visible_indices,
};
use self::render::{CatalogView, draw_tui};
use self::session::TuiSession;

const POLL_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
    SaveName,
}

pub(crate) fn run_tui(
    db: &mut Database,
    playlist: Playlist,
    is_saved: bool,
    autoplay: bool,
) -> Result<()> {
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let settings = Settings::load(db);
    let mut controller = PlayerController::with_default_backends(settings);
    let channel_count = playlist.entries.len();
    let playlist_name = playlist.name.clone();
    // The entry list is immutable for the lifetime of the session; only the
    // playlist name can change (on save).
    let entries = playlist.entries.clone();
    controller.load_playlist(playlist, is_saved);

    let mut table_state = TableState::default();
    table_state.select((channel_count > 0).then_some(0));
    let mut search = String::new();
    let mut group_filter: Option<String> = None;
    let mut favorites_only = false;
    let mut input_mode = InputMode::Normal;
    let mut input_buffer = String::new();
    let mut pending_notice: Option<String> = None;
    let mut favorites: HashSet<String> = db.favorites()?.into_iter().collect();
    let mut status = if channel_count == 0 {
        status_info("No playlist loaded. Run `flixtrack load <source>` to add one.")
    } else {
        status_info(&format!(
            "Loaded {channel_count} channels from \"{playlist_name}\""
        ))
    };

    if autoplay && channel_count > 0 {
        controller.play(db, 0)?;
    }

    loop {
        controller.pump_events(db)?;
        controller.tick(db, Instant::now())?;
        for notice in controller.drain_notices() {
            match notice.level {
                NoticeLevel::Info => status = status_info(&notice.message),
                NoticeLevel::Error => status = status_error(&notice.message),
                NoticeLevel::Terminal => {
                    status = status_error(&notice.message);
                    pending_notice = Some(format!(
                        "{}\n\nPress any key to continue.",
                        notice.message
                    ));
                }
            }
        }

        let resumable: HashSet<String> = db
            .resumable_urls(RESUME_THRESHOLD_SECS)?
            .into_iter()
            .collect();
        let visible = visible_indices(
            &entries,
            &search,
            group_filter.as_deref(),
            favorites_only.then_some(&favorites),
        );
        clamp_selection(&mut table_state, visible.len());

        let input_label = match input_mode {
            InputMode::Normal => None,
            InputMode::Search => Some("Search"),
            InputMode::SaveName => Some("Save playlist as"),
        };
        let view = CatalogView {
            playlist_name: &controller.playlist().name,
            entries: &entries,
            visible: &visible,
            favorites: &favorites,
            resumable: &resumable,
            active_index: controller.active_index(),
            backend: controller.backend_kind(),
            state: controller.state(),
            current: controller.current_entry(),
            progress: controller.last_progress(),
            status: &status,
            search: &search,
            group: group_filter.as_deref(),
            favorites_only,
            unsaved: !controller.is_saved(),
            auto_advance: controller.settings().auto_advance,
            input: input_label.map(|label| (label, input_buffer.as_str())),
            notice: pending_notice.as_deref(),
        };
        terminal.draw(|frame| draw_tui(frame, &view, &mut table_state))?;

        if !event::poll(POLL_PERIOD)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if pending_notice.is_some() {
            pending_notice = None;
            continue;
        }

        if input_mode != InputMode::Normal {
            match key.code {
                KeyCode::Esc => {
                    if input_mode == InputMode::Search {
                        search.clear();
                    }
                    input_mode = InputMode::Normal;
                    input_buffer.clear();
                }
                KeyCode::Enter => {
                    if input_mode == InputMode::SaveName {
                        let name = input_buffer.trim().to_string();
                        if name.is_empty() {
                            status = status_info("Playlist save cancelled.");
                        } else {
                            controller.save_playlist_as(db, &name)?;
                            status = status_info(&format!("Saved \"{name}\""));
                        }
                    }
                    input_mode = InputMode::Normal;
                    input_buffer.clear();
                }
                KeyCode::Backspace => {
                    input_buffer.pop();
                    if input_mode == InputMode::Search {
                        search = input_buffer.clone();
                    }
                }
                KeyCode::Char(c) => {
                    input_buffer.push(c);
                    if input_mode == InputMode::Search {
                        search = input_buffer.clone();
                    }
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => {
                controller.close();
                break;
            }
            KeyCode::Up => {
                if let Some(selected) = table_state.selected() {
                    table_state.select(Some(selected.saturating_sub(1)));
                }
            }
            KeyCode::Down => {
                if let Some(selected) = table_state.selected()
                    && !visible.is_empty()
                {
                    let next = (selected + 1).min(visible.len() - 1);
                    table_state.select(Some(next));
                }
            }
            KeyCode::Enter => {
                let Some(index) = selected_entry_index(&table_state, &visible) else {
                    continue;
                };
                controller.play(db, index)?;
            }
            KeyCode::Char('n') => controller.next(db)?,
            KeyCode::Char('p') => controller.previous(db)?,
            KeyCode::Char('b') => controller.switch_backend_manual(db)?,
            KeyCode::Char('c') => {
                controller.close();
                status = status_info("Player closed.");
            }
            KeyCode::Char('f') => {
                let Some(index) = selected_entry_index(&table_state, &visible) else {
                    status = status_error("Nothing selected to favorite.");
                    continue;
                };
                let entry = &entries[index];
                let now_favorite = db.toggle_favorite(&entry.source_url)?;
                if now_favorite {
                    favorites.insert(entry.source_url.clone());
                    status = status_info(&format!(
                        "Added \"{}\" to favorites",
                        truncate(&entry.title, 40)
                    ));
                } else {
                    favorites.remove(&entry.source_url);
                    status = status_info(&format!(
                        "Removed \"{}\" from favorites",
                        truncate(&entry.title, 40)
                    ));
                }
            }
            KeyCode::Char('F') => {
                favorites_only = !favorites_only;
                status = status_info(if favorites_only {
                    "Showing favorites only."
                } else {
                    "Showing all channels."
                });
            }
            KeyCode::Char('w') => {
                if controller.is_saved() {
                    status = status_info("Playlist is already saved.");
                } else {
                    input_mode = InputMode::SaveName;
                    input_buffer = controller.playlist().name.clone();
                }
            }
            KeyCode::Char('/') => {
                input_mode = InputMode::Search;
                input_buffer = search.clone();
            }
            KeyCode::Char('g') => {
                let groups = group_names(&entries);
                group_filter = cycle_group(&groups, group_filter.as_deref());
                status = match group_filter.as_deref() {
                    Some(group) => status_info(&format!("Category: {group}")),
                    None => status_info("Category: all"),
                };
            }
            KeyCode::Char('a') => {
                let enabled = !controller.settings().auto_advance;
                controller.set_auto_advance(db, enabled)?;
                status = status_info(if enabled {
                    "Auto-advance on."
                } else {
                    "Auto-advance off."
                });
            }
            KeyCode::Esc => {
                search.clear();
                group_filter = None;
                favorites_only = false;
            }
            _ => {}
        }
    }

    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

fn selected_entry_index(table_state: &TableState, visible: &[usize]) -> Option<usize> {
    let row = table_state.selected()?;
    visible.get(row).copied()
}
