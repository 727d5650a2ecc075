use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::sync::mpsc;

use anyhow::Result;

use crate::app::playlist::Entry;
use crate::db::ResumeRecord;

use super::backend::{
    BackendKind, PlayerBackend, PlayerEvent, ProcessHandle, binary_on_path, resolve_backend_bin,
};

/// Native backend: mpv with a JSON IPC socket for position queries.
pub(crate) struct MpvBackend {
    events: mpsc::Sender<PlayerEvent>,
    generation: u64,
    handle: Option<ProcessHandle>,
    socket_path: PathBuf,
}

impl MpvBackend {
    pub(crate) fn new(events: mpsc::Sender<PlayerEvent>, generation: u64) -> Self {
        let socket_path = std::env::temp_dir().join(format!(
            "flixtrack-mpv-{}-{generation}.sock",
            std::process::id()
        ));
        Self {
            events,
            generation,
            handle: None,
            socket_path,
        }
    }
}

impl PlayerBackend for MpvBackend {
    fn start(&mut self, entry: &Entry, start_offset_secs: f64) -> Result<()> {
        let bin = resolve_backend_bin(BackendKind::Mpv);
        let mut cmd = ProcessCommand::new(&bin);
        cmd.args(build_mpv_args(
            entry,
            start_offset_secs,
            binary_on_path("yt-dlp"),
            &self.socket_path,
        ));
        self.handle = Some(ProcessHandle::spawn(
            cmd,
            self.events.clone(),
            self.generation,
        )?);
        Ok(())
    }

    fn query_position(&self) -> Option<ResumeRecord> {
        let handle = self.handle.as_ref()?;
        if handle.is_destroyed() {
            return None;
        }
        ipc::query_progress(&self.socket_path).filter(ResumeRecord::is_storable)
    }

    fn destroy(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.destroy();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Adaptive-streaming manifests get special handling: with yt-dlp on PATH
/// mpv's ytdl hook resolves the stream, otherwise mpv's built-in HLS
/// demuxer takes the URL as-is. Plain URLs are passed straight through.
pub(crate) fn build_mpv_args(
    entry: &Entry,
    start_offset_secs: f64,
    ytdlp_available: bool,
    socket_path: &Path,
) -> Vec<String> {
    let mut args = vec![
        "--no-terminal".to_string(),
        format!("--input-ipc-server={}", socket_path.display()),
        format!("--force-media-title={}", entry.title),
    ];
    if start_offset_secs > 0.0 {
        args.push(format!("--start={start_offset_secs:.1}"));
    }
    if is_hls_manifest(&entry.source_url) {
        args.push(if ytdlp_available {
            "--ytdl=yes".to_string()
        } else {
            "--ytdl=no".to_string()
        });
    }
    args.push(entry.source_url.clone());
    args
}

pub(crate) fn is_hls_manifest(url: &str) -> bool {
    url.contains(".m3u8")
}

#[cfg(unix)]
mod ipc {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::time::Duration;

    use crate::db::ResumeRecord;

    const IPC_TIMEOUT: Duration = Duration::from_millis(500);
    // mpv interleaves asynchronous event lines with replies.
    const MAX_REPLY_LINES: usize = 32;

    pub(super) fn query_progress(socket_path: &Path) -> Option<ResumeRecord> {
        let mut stream = UnixStream::connect(socket_path).ok()?;
        stream.set_read_timeout(Some(IPC_TIMEOUT)).ok()?;
        stream.set_write_timeout(Some(IPC_TIMEOUT)).ok()?;

        let position = get_property(&mut stream, "time-pos")?;
        let duration = get_property(&mut stream, "duration")?;
        Some(ResumeRecord { position, duration })
    }

    fn get_property(stream: &mut UnixStream, name: &str) -> Option<f64> {
        let request = serde_json::json!({ "command": ["get_property", name] });
        let mut line = serde_json::to_string(&request).ok()?;
        line.push('\n');
        stream.write_all(line.as_bytes()).ok()?;

        let reader = BufReader::new(stream.try_clone().ok()?);
        for line in reader.lines().take(MAX_REPLY_LINES) {
            let line = line.ok()?;
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) else {
                continue;
            };
            if value.get("event").is_some() {
                continue;
            }
            if value.get("error").and_then(|e| e.as_str()) != Some("success") {
                return None;
            }
            return value.get("data").and_then(|d| d.as_f64());
        }
        None
    }
}

#[cfg(not(unix))]
mod ipc {
    use std::path::Path;

    use crate::db::ResumeRecord;

    pub(super) fn query_progress(_socket_path: &Path) -> Option<ResumeRecord> {
        None
    }
}
