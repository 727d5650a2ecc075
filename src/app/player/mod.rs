pub(crate) mod backend;
mod ffplay;
mod mpv;
mod vlc;

use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::app::playlist::{Entry, Playlist, format_duration};
use crate::app::settings::Settings;
use crate::db::Database;
use crate::db::ResumeRecord;

use self::backend::{BackendFactory, BackendKind, PlayerBackend, PlayerEvent, PlayerEventKind};

/// Stored positions at or below this many seconds are not worth resuming.
pub(crate) const RESUME_THRESHOLD_SECS: f64 = 5.0;

const SAVE_PERIOD: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerState {
    /// No live backend. `active_index` is usually `None` too, except after a
    /// clean end with auto-advance off, where the index is kept so `next`
    /// continues from the entry that just finished.
    Idle,
    Loading,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NoticeLevel {
    Info,
    Error,
    /// All backend kinds failed for the current entry; playback stopped.
    Terminal,
}

#[derive(Debug, Clone)]
pub(crate) struct Notice {
    pub(crate) level: NoticeLevel,
    pub(crate) message: String,
}

#[derive(Debug)]
struct SaveTimer {
    last_saved: Instant,
}

impl SaveTimer {
    fn new(now: Instant) -> Self {
        Self { last_saved: now }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_saved) < SAVE_PERIOD {
            return false;
        }
        self.last_saved = now;
        true
    }
}

/// Owns the live playback session: current playlist position, the active
/// backend, error-triggered rotation between backends, and the resume
/// position schedule. Exposes plain data for the TUI to render; no
/// rendering happens here.
///
/// Invariants: at most one backend handle is live, and at most one
/// position-save timer exists (a previous one is always cancelled in
/// `teardown` before a new one is armed).
pub(crate) struct PlayerController {
    playlist: Playlist,
    is_saved: bool,
    active_index: Option<usize>,
    backend_kind: BackendKind,
    backend: Option<Box<dyn PlayerBackend>>,
    state: PlayerState,
    settings: Settings,
    factory: BackendFactory,
    events_tx: mpsc::Sender<PlayerEvent>,
    events_rx: mpsc::Receiver<PlayerEvent>,
    /// Bumped on every adapter construction; events from older generations
    /// come from already-destroyed adapters and are dropped.
    generation: u64,
    /// Backend kinds already tried for the current entry. Bounds automatic
    /// rotation to one full circle; reset on manual play and on a confirmed
    /// successful start.
    attempted_kinds: Vec<BackendKind>,
    save_timer: Option<SaveTimer>,
    last_progress: Option<ResumeRecord>,
    notices: Vec<Notice>,
}

impl PlayerController {
    pub(crate) fn new(settings: Settings, factory: BackendFactory) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            playlist: Playlist::empty("No playlist"),
            is_saved: true,
            active_index: None,
            backend_kind: settings.preferred_backend,
            backend: None,
            state: PlayerState::Idle,
            settings,
            factory,
            events_tx,
            events_rx,
            generation: 0,
            attempted_kinds: Vec::new(),
            save_timer: None,
            last_progress: None,
            notices: Vec::new(),
        }
    }

    pub(crate) fn with_default_backends(settings: Settings) -> Self {
        Self::new(settings, backend::default_factory())
    }

    // ----- session state for the rendering layer -----

    pub(crate) fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub(crate) fn is_saved(&self) -> bool {
        self.is_saved
    }

    pub(crate) fn state(&self) -> PlayerState {
        self.state
    }

    pub(crate) fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub(crate) fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub(crate) fn current_entry(&self) -> Option<&Entry> {
        self.active_index
            .and_then(|index| self.playlist.entries.get(index))
    }

    pub(crate) fn last_progress(&self) -> Option<ResumeRecord> {
        self.last_progress
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ----- operations -----

    /// Replace the active playlist. Never auto-starts playback; an active
    /// session is closed first so the index invariant holds.
    pub(crate) fn load_playlist(&mut self, playlist: Playlist, is_saved: bool) {
        self.close();
        self.playlist = playlist;
        self.is_saved = is_saved;
    }

    /// Persist the loaded playlist under `name` and hide the save affordance.
    pub(crate) fn save_playlist_as(&mut self, db: &mut Database, name: &str) -> Result<()> {
        self.playlist.name = name.to_string();
        db.save_playlist(&self.playlist)?;
        self.is_saved = true;
        Ok(())
    }

    pub(crate) fn play(&mut self, db: &Database, index: usize) -> Result<()> {
        self.play_inner(db, index, false)
    }

    pub(crate) fn next(&mut self, db: &Database) -> Result<()> {
        let len = self.playlist.entries.len();
        if len == 0 {
            return Ok(());
        }
        let index = self.active_index.map_or(0, |i| (i + 1) % len);
        self.play(db, index)
    }

    pub(crate) fn previous(&mut self, db: &Database) -> Result<()> {
        let len = self.playlist.entries.len();
        if len == 0 {
            return Ok(());
        }
        let index = match self.active_index {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.play(db, index)
    }

    /// User-initiated rotation to the next backend kind. Persists the new
    /// preference and replays the active entry through the new backend.
    pub(crate) fn switch_backend_manual(&mut self, db: &Database) -> Result<()> {
        let next = self.backend_kind.next_kind();
        self.attempted_kinds.clear();
        self.push_notice(
            NoticeLevel::Info,
            format!("Switched player to {}", next.label()),
        );
        self.apply_backend_kind(db, next)
    }

    /// Tear everything down and return to idle.
    pub(crate) fn close(&mut self) {
        self.teardown();
        self.active_index = None;
        self.state = PlayerState::Idle;
    }

    /// Drain backend events. Errors rotate to the next backend; a clean end
    /// advances to the next entry when auto-advance is on. Events from
    /// superseded generations are dropped.
    pub(crate) fn pump_events(&mut self, db: &Database) -> Result<()> {
        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            if event.generation != self.generation {
                continue;
            }
            match event.kind {
                PlayerEventKind::Ended => {
                    self.attempted_kinds.clear();
                    if self.settings.auto_advance {
                        self.next(db)?;
                    } else {
                        self.teardown();
                        self.state = PlayerState::Idle;
                    }
                }
                PlayerEventKind::Errored(detail) => {
                    self.rotate_on_error(db, &detail)?;
                }
            }
        }
        Ok(())
    }

    /// Position-persistence tick, pumped from the TUI poll loop. Every
    /// three seconds of playback the active backend is probed; an
    /// unavailable probe skips the tick so stored resume data is never
    /// overwritten with junk.
    pub(crate) fn tick(&mut self, db: &Database, now: Instant) -> Result<()> {
        if self.state != PlayerState::Playing {
            return Ok(());
        }
        let Some(timer) = self.save_timer.as_mut() else {
            return Ok(());
        };
        if !timer.due(now) {
            return Ok(());
        }
        let Some(progress) = self.backend.as_ref().and_then(|b| b.query_position()) else {
            return Ok(());
        };
        self.last_progress = Some(progress);
        // First valid position confirms the start and resets the failover
        // budget for this entry.
        self.attempted_kinds.clear();
        if let Some(entry) = self.current_entry() {
            db.upsert_resume(&entry.source_url, progress)?;
        }
        Ok(())
    }

    pub(crate) fn set_auto_advance(&mut self, db: &Database, enabled: bool) -> Result<()> {
        self.settings.auto_advance = enabled;
        self.settings.save(db)
    }

    // ----- internals -----

    fn play_inner(&mut self, db: &Database, index: usize, is_switch: bool) -> Result<()> {
        let Some(entry) = self.playlist.entries.get(index).cloned() else {
            return Ok(());
        };

        // Destroy-before-construct: the old adapter and its timer must be
        // gone before the new one mounts.
        self.teardown();
        self.active_index = Some(index);
        self.state = PlayerState::Loading;

        if !is_switch {
            self.attempted_kinds.clear();
            db.push_history(&entry)?;
        }

        let offset = match db.resume_for(&entry.source_url)? {
            Some(record) if record.position > RESUME_THRESHOLD_SECS => record.position,
            _ => 0.0,
        };

        self.generation += 1;
        if !self.attempted_kinds.contains(&self.backend_kind) {
            self.attempted_kinds.push(self.backend_kind);
        }

        let constructed = (self.factory)(self.backend_kind, self.events_tx.clone(), self.generation)
            .and_then(|mut backend| {
                backend.start(&entry, offset)?;
                Ok(backend)
            });
        match constructed {
            Ok(backend) => {
                self.backend = Some(backend);
                self.save_timer = Some(SaveTimer::new(Instant::now()));
                self.state = PlayerState::Playing;
                if !is_switch {
                    // Suppressed on automatic switch replays so failover
                    // does not double-announce the same entry.
                    let resume_note = if offset > 0.0 {
                        format!(", resuming at {}", format_duration(offset))
                    } else {
                        String::new()
                    };
                    self.push_notice(
                        NoticeLevel::Info,
                        format!(
                            "Now playing \"{}\" via {}{resume_note}",
                            entry.title,
                            self.backend_kind.label()
                        ),
                    );
                }
                Ok(())
            }
            Err(err) => self.rotate_on_error(db, &format!("{err:#}")),
        }
    }

    /// Automatic failover after a playback or startup error. Rotation is
    /// bounded: once the next kind has already been attempted for this
    /// entry, the failure is terminal and the session closes.
    fn rotate_on_error(&mut self, db: &Database, detail: &str) -> Result<()> {
        let failed = self.backend_kind;
        let next = failed.next_kind();

        if self.attempted_kinds.contains(&next) {
            let title = self
                .current_entry()
                .map(|entry| entry.title.clone())
                .unwrap_or_else(|| "the current entry".to_string());
            self.push_notice(
                NoticeLevel::Terminal,
                format!(
                    "{} failed: {detail}. Every player has failed for \"{title}\"; giving up.",
                    failed.label()
                ),
            );
            self.close();
            return Ok(());
        }

        self.push_notice(
            NoticeLevel::Error,
            format!("{} failed: {detail}. Trying {}.", failed.label(), next.label()),
        );
        self.apply_backend_kind(db, next)
    }

    fn apply_backend_kind(&mut self, db: &Database, next: BackendKind) -> Result<()> {
        self.backend_kind = next;
        self.settings.preferred_backend = next;
        self.settings.save(db)?;
        match self.active_index {
            Some(index) => self.play_inner(db, index, true),
            None => Ok(()),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.destroy();
        }
        self.save_timer = None;
        self.last_progress = None;
    }

    fn push_notice(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
    }

    #[cfg(test)]
    pub(crate) fn has_save_timer(&self) -> bool {
        self.save_timer.is_some()
    }

    #[cfg(test)]
    pub(crate) fn has_live_backend(&self) -> bool {
        self.backend.is_some()
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
