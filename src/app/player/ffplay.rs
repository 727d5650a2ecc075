use std::process::Command as ProcessCommand;
use std::sync::mpsc;

use anyhow::Result;

use crate::app::playlist::Entry;
use crate::db::ResumeRecord;

use super::backend::{
    BackendKind, PlayerBackend, PlayerEvent, ProcessHandle, resolve_backend_bin,
};

/// ffplay fallback backend, the last stop in the rotation order. Like VLC it
/// reports no position, so resume ticks are skipped while it is active.
pub(crate) struct FfplayBackend {
    events: mpsc::Sender<PlayerEvent>,
    generation: u64,
    handle: Option<ProcessHandle>,
}

impl FfplayBackend {
    pub(crate) fn new(events: mpsc::Sender<PlayerEvent>, generation: u64) -> Self {
        Self {
            events,
            generation,
            handle: None,
        }
    }
}

impl PlayerBackend for FfplayBackend {
    fn start(&mut self, entry: &Entry, start_offset_secs: f64) -> Result<()> {
        let bin = resolve_backend_bin(BackendKind::Ffplay);
        let mut cmd = ProcessCommand::new(&bin);
        cmd.args(build_ffplay_args(entry, start_offset_secs));
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

impl Drop for FfplayBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub(crate) fn build_ffplay_args(entry: &Entry, start_offset_secs: f64) -> Vec<String> {
    let mut args = vec![
        "-autoexit".to_string(),
        "-window_title".to_string(),
        entry.title.clone(),
    ];
    if start_offset_secs > 0.0 {
        args.push("-ss".to_string());
        args.push(format!("{start_offset_secs:.1}"));
    }
    args.push(entry.source_url.clone());
    args
}
