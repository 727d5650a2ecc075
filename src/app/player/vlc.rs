use std::process::Command as ProcessCommand;
use std::sync::mpsc;

use anyhow::Result;

use crate::app::playlist::Entry;
use crate::db::ResumeRecord;

use super::backend::{
    BackendKind, PlayerBackend, PlayerEvent, ProcessHandle, resolve_backend_bin,
};

/// VLC fallback backend. VLC exposes no position over this integration, so
/// `query_position` stays unavailable and resume data from earlier backends
/// is left untouched.
pub(crate) struct VlcBackend {
    events: mpsc::Sender<PlayerEvent>,
    generation: u64,
    handle: Option<ProcessHandle>,
}

impl VlcBackend {
    pub(crate) fn new(events: mpsc::Sender<PlayerEvent>, generation: u64) -> Self {
        Self {
            events,
            generation,
            handle: None,
        }
    }
}

impl PlayerBackend for VlcBackend {
    fn start(&mut self, entry: &Entry, start_offset_secs: f64) -> Result<()> {
        let bin = resolve_backend_bin(BackendKind::Vlc);
        let mut cmd = ProcessCommand::new(&bin);
        cmd.args(build_vlc_args(entry, start_offset_secs));
        self.handle = Some(ProcessHandle::spawn(
            cmd,
            self.events.clone(),
            self.generation,
        )?);
        Ok(())
    }

    fn query_position(&self) -> Option<ResumeRecord> {
        None
    }

    fn destroy(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.destroy();
        }
    }
}

impl Drop for VlcBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub(crate) fn build_vlc_args(entry: &Entry, start_offset_secs: f64) -> Vec<String> {
    let mut args = vec![
        "--play-and-exit".to_string(),
        format!("--meta-title={}", entry.title),
    ];
    if start_offset_secs > 0.0 {
        args.push(format!("--start-time={start_offset_secs:.1}"));
    }
    args.push(entry.source_url.clone());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_exit_after_playback_and_carry_the_offset() {
        let entry = Entry {
            title: "Channel B".to_string(),
            group: "Sports".to_string(),
            logo_url: String::new(),
            source_url: "http://x/b.mp4".to_string(),
        };
        let args = build_vlc_args(&entry, 12.0);
        assert!(args.contains(&"--play-and-exit".to_string()));
        assert!(args.contains(&"--start-time=12.0".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("http://x/b.mp4"));

        let cold = build_vlc_args(&entry, 0.0);
        assert!(!cold.iter().any(|a| a.starts_with("--start-time=")));
    }
}
