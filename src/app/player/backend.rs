use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::app::playlist::Entry;
use crate::db::ResumeRecord;

/// One of the interchangeable players the controller can mount.
///
/// The rotation order is fixed: mpv is the native default, VLC and ffplay
/// are the fallbacks tried on playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BackendKind {
    Mpv,
    Vlc,
    Ffplay,
}

#[cfg(test)]
pub(crate) const ALL_BACKEND_KINDS: [BackendKind; 3] =
    [BackendKind::Mpv, BackendKind::Vlc, BackendKind::Ffplay];

impl BackendKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Mpv => "mpv",
            Self::Vlc => "VLC",
            Self::Ffplay => "ffplay",
        }
    }

    pub(crate) fn next_kind(self) -> Self {
        match self {
            Self::Mpv => Self::Vlc,
            Self::Vlc => Self::Ffplay,
            Self::Ffplay => Self::Mpv,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlayerEventKind {
    Ended,
    Errored(String),
}

/// Generation-tagged event from a backend's watcher thread. The controller
/// drops events whose generation is not the live one, so a watcher that
/// outlives its adapter cannot act on a stale handle.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlayerEvent {
    pub(crate) generation: u64,
    pub(crate) kind: PlayerEventKind,
}

/// Uniform capability set over the heterogeneous player integrations.
///
/// Callers must `destroy` the previous adapter before `start`ing another;
/// `destroy` is safe to call repeatedly and on a never-started adapter.
pub(crate) trait PlayerBackend {
    fn start(&mut self, entry: &Entry, start_offset_secs: f64) -> Result<()>;

    /// `None` until the player reports a finite position and a positive
    /// duration; the caller skips the persistence tick in that case.
    fn query_position(&self) -> Option<ResumeRecord>;

    fn destroy(&mut self);
}

pub(crate) type BackendFactory =
    Box<dyn Fn(BackendKind, mpsc::Sender<PlayerEvent>, u64) -> Result<Box<dyn PlayerBackend>>>;

pub(crate) fn default_factory() -> BackendFactory {
    Box::new(|kind, events, generation| {
        let backend: Box<dyn PlayerBackend> = match kind {
            BackendKind::Mpv => Box::new(super::mpv::MpvBackend::new(events, generation)),
            BackendKind::Vlc => Box::new(super::vlc::VlcBackend::new(events, generation)),
            BackendKind::Ffplay => Box::new(super::ffplay::FfplayBackend::new(events, generation)),
        };
        Ok(backend)
    })
}

pub(crate) fn resolve_backend_bin(kind: BackendKind) -> PathBuf {
    let (var, fallback) = match kind {
        BackendKind::Mpv => ("FLIXTRACK_MPV_BIN", "mpv"),
        BackendKind::Vlc => ("FLIXTRACK_VLC_BIN", "cvlc"),
        BackendKind::Ffplay => ("FLIXTRACK_FFPLAY_BIN", "ffplay"),
    };
    resolve_bin_from_env(env::var_os(var), fallback)
}

pub(crate) fn resolve_bin_from_env(env_value: Option<OsString>, fallback: &str) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(fallback),
    }
}

pub(crate) fn binary_on_path(name: &str) -> bool {
    let Some(path) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path).any(|dir| dir.join(name).is_file())
}

const WATCH_POLL_PERIOD: Duration = Duration::from_millis(200);

/// Spawned player process plus the watcher thread that reports its exit.
///
/// The watcher sends exactly one generation-tagged event: `Ended` on a clean
/// exit, `Errored` otherwise. Nothing is sent once `destroy` has run.
pub(crate) struct ProcessHandle {
    child: Arc<Mutex<Child>>,
    destroyed: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    pub(crate) fn spawn(
        mut cmd: ProcessCommand,
        events: mpsc::Sender<PlayerEvent>,
        generation: u64,
    ) -> Result<Self> {
        let program = cmd.get_program().to_os_string();
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch {}", program.to_string_lossy()))?;

        let child = Arc::new(Mutex::new(child));
        let destroyed = Arc::new(AtomicBool::new(false));

        let watch_child = Arc::clone(&child);
        let watch_destroyed = Arc::clone(&destroyed);
        let watcher = std::thread::spawn(move || {
            loop {
                if watch_destroyed.load(Ordering::SeqCst) {
                    return;
                }
                let status = {
                    let Ok(mut child) = watch_child.lock() else {
                        return;
                    };
                    match child.try_wait() {
                        Ok(status) => status,
                        Err(_) => None,
                    }
                };
                if let Some(status) = status {
                    if !watch_destroyed.load(Ordering::SeqCst) {
                        let kind = if status.success() {
                            PlayerEventKind::Ended
                        } else {
                            PlayerEventKind::Errored(format!("player exited with {status}"))
                        };
                        let _ = events.send(PlayerEvent { generation, kind });
                    }
                    return;
                }
                std::thread::sleep(WATCH_POLL_PERIOD);
            }
        });

        Ok(Self {
            child,
            destroyed,
            watcher: Some(watcher),
        })
    }

    pub(crate) fn destroy(&mut self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_cycle_visits_every_kind_once() {
        let mut kind = BackendKind::Mpv;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(kind);
            kind = kind.next_kind();
        }
        assert_eq!(seen, ALL_BACKEND_KINDS);
        assert_eq!(kind, BackendKind::Mpv);
    }

    #[test]
    fn resolve_bin_prefers_non_empty_env_override() {
        assert_eq!(
            resolve_bin_from_env(Some(OsString::from("/opt/bin/mpv")), "mpv"),
            PathBuf::from("/opt/bin/mpv")
        );
        assert_eq!(
            resolve_bin_from_env(Some(OsString::new()), "mpv"),
            PathBuf::from("mpv")
        );
        assert_eq!(resolve_bin_from_env(None, "cvlc"), PathBuf::from("cvlc"));
    }

    #[cfg(unix)]
    #[test]
    fn clean_exit_is_reported_as_ended_once() {
        let (tx, rx) = mpsc::channel();
        let mut cmd = ProcessCommand::new("sh");
        cmd.arg("-c").arg("exit 0");
        let _handle = ProcessHandle::spawn(cmd, tx, 7).expect("spawn sh");

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("watcher should report the exit");
        assert_eq!(event.generation, 7);
        assert_eq!(event.kind, PlayerEventKind::Ended);
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_is_reported_as_error() {
        let (tx, rx) = mpsc::channel();
        let mut cmd = ProcessCommand::new("sh");
        cmd.arg("-c").arg("exit 3");
        let _handle = ProcessHandle::spawn(cmd, tx, 1).expect("spawn sh");

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("watcher should report the exit");
        assert!(matches!(event.kind, PlayerEventKind::Errored(_)));
    }

    #[cfg(unix)]
    #[test]
    fn destroy_is_idempotent_and_suppresses_events() {
        let (tx, rx) = mpsc::channel();
        let mut cmd = ProcessCommand::new("sleep");
        cmd.arg("30");
        let mut handle = ProcessHandle::spawn(cmd, tx, 1).expect("spawn sleep");

        handle.destroy();
        handle.destroy();
        assert!(handle.is_destroyed());
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn missing_binary_fails_fast() {
        let (tx, _rx) = mpsc::channel();
        let cmd = ProcessCommand::new("flixtrack-no-such-player");
        assert!(ProcessHandle::spawn(cmd, tx, 1).is_err());
    }
}
