// src/progress.rs

//! Status reporting for installation runs
//!
//! An installation run reports one-way string messages to a [`StatusSink`]:
//! step messages while it works, byte progress while downloading, and
//! exactly one terminal message (the final report or `error: <cause>`).
//!
//! Implementations:
//! - `CliProgress`: spinner and download bar using indicatif
//! - `LogProgress`: logs to tracing
//! - `SilentProgress`: no-op for quiet and scripted modes
//! - `CallbackProgress`: calls a closure with each [`ProgressEvent`]
//! - `ChannelProgress`: forwards events over an mpsc channel to another thread

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info};

/// Events emitted by an installation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Step message ("Downloading zlib...", "Unpacking files...")
    Message(String),
    /// Bytes received for the archive currently downloading
    Download {
        name: String,
        current: u64,
        total: Option<u64>,
    },
    /// Run finished; carries the final report
    Finished(String),
    /// Run aborted; carries `error: <cause>`
    Error(String),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Finished(_) | ProgressEvent::Error(_))
    }
}

/// Receiver of status messages
///
/// Implementations must be thread-safe: a run pushes from its background
/// worker while the caller observes from elsewhere.
pub trait StatusSink: Send + Sync {
    /// Report a step of the run
    fn status(&self, message: &str);

    /// Report download progress
    fn download_progress(&self, _name: &str, _current: u64, _total: Option<u64>) {}

    /// Final report of a successful run
    fn finished(&self, message: &str);

    /// Terminal error of a failed run
    fn failed(&self, message: &str);
}

/// No-op sink
#[derive(Debug, Default)]
pub struct SilentProgress {
    finished: AtomicBool,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal message was received
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

impl StatusSink for SilentProgress {
    fn status(&self, _message: &str) {}

    fn finished(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn failed(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

/// Sink that logs to tracing
#[derive(Debug)]
pub struct LogProgress {
    name: String,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new("install")
    }
}

impl StatusSink for LogProgress {
    fn status(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn download_progress(&self, name: &str, current: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                debug!("{}: {} {}% ({}/{})", self.name, name, current * 100 / total, current, total)
            }
            _ => debug!("{}: {} {} bytes", self.name, name, current),
        }
    }

    fn finished(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn failed(&self, message: &str) {
        error!("{}: {}", self.name, message);
    }
}

/// Sink that calls a closure with each event
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> StatusSink for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn status(&self, message: &str) {
        (self.callback)(ProgressEvent::Message(message.to_string()));
    }

    fn download_progress(&self, name: &str, current: u64, total: Option<u64>) {
        (self.callback)(ProgressEvent::Download {
            name: name.to_string(),
            current,
            total,
        });
    }

    fn finished(&self, message: &str) {
        (self.callback)(ProgressEvent::Finished(message.to_string()));
    }

    fn failed(&self, message: &str) {
        (self.callback)(ProgressEvent::Error(message.to_string()));
    }
}

/// Sink that forwards events over a channel
///
/// Send errors (receiver dropped) are ignored; the run keeps going.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            debug!("Status receiver dropped");
        }
    }
}

impl StatusSink for ChannelProgress {
    fn status(&self, message: &str) {
        self.send(ProgressEvent::Message(message.to_string()));
    }

    fn download_progress(&self, name: &str, current: u64, total: Option<u64>) {
        self.send(ProgressEvent::Download {
            name: name.to_string(),
            current,
            total,
        });
    }

    fn finished(&self, message: &str) {
        self.send(ProgressEvent::Finished(message.to_string()));
    }

    fn failed(&self, message: &str) {
        self.send(ProgressEvent::Error(message.to_string()));
    }
}

/// Terminal sink with a status spinner and a per-download byte bar
pub struct CliProgress {
    bar: ProgressBar,
    /// Archive the bar currently shows bytes for
    downloading: Mutex<Option<String>>,
}

impl CliProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            downloading: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template")
    }

    fn download_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-")
    }

    fn end_download(&self) {
        if let Ok(mut current) = self.downloading.lock()
            && current.take().is_some()
        {
            self.bar.set_style(Self::spinner_style());
            self.bar.set_length(0);
            self.bar.set_position(0);
        }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for CliProgress {
    fn status(&self, message: &str) {
        self.end_download();
        self.bar.set_message(message.to_string());
    }

    fn download_progress(&self, name: &str, current: u64, total: Option<u64>) {
        if let Ok(mut downloading) = self.downloading.lock()
            && downloading.as_deref() != Some(name)
        {
            *downloading = Some(name.to_string());
            self.bar.set_style(Self::download_style());
            self.bar.set_message(name.to_string());
        }
        if let Some(total) = total {
            self.bar.set_length(total);
        }
        self.bar.set_position(current);
    }

    fn finished(&self, message: &str) {
        self.end_download();
        self.bar.finish_and_clear();
        println!("{}", message);
    }

    fn failed(&self, message: &str) {
        self.end_download();
        self.bar.abandon_with_message(message.to_string());
    }
}
