//! Terminal progress display driven by coordinator events.
//!
//! [`Progress`] implements [`EventObserver`] and renders a spinner with a
//! completed/dispatched counter while a run is active. Use
//! [`spawn_observer`] to feed it from the coordinator's event stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;
use indicatif::{ProgressBar, ProgressStyle};

use crate::coordinator::Event;

/// Receiver of coordinator events.
pub trait EventObserver: Send + Sync {
    /// Called once per event, in emission order.
    fn on_event(&self, event: &Event);
}

/// Forward every event to `observer` on a background thread.
///
/// The thread ends when the event stream closes, which happens once the
/// coordinator and all its workers have stopped.
pub fn spawn_observer(
    events: Receiver<Event>,
    observer: Arc<dyn EventObserver>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("events".to_string())
        .spawn(move || {
            for event in events.iter() {
                observer.on_event(&event);
            }
        })
}

/// Spinner-based progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
    echo: AtomicBool,
}

impl Progress {
    /// Create a reporter. A quiet reporter draws nothing.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
            echo: AtomicBool::new(false),
        }
    }

    /// Print every message on its own line instead of only showing the
    /// latest one next to the spinner.
    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::SeqCst);
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(bar) = bar.as_ref() {
                f(bar);
            }
        }
    }

    fn begin(&self) {
        let Ok(mut bar) = self.bar.lock() else {
            return;
        };
        if bar.is_none() {
            let pb = ProgressBar::new(0);
            pb.set_style(Self::style());
            pb.set_message("Scanning");
            pb.enable_steady_tick(Duration::from_millis(100));
            *bar = Some(pb);
        }
    }

    fn end(&self) {
        if let Some(pb) = self.bar.lock().ok().and_then(|mut bar| bar.take()) {
            pb.finish_and_clear();
        }
    }

    fn message(&self, text: &str) {
        if self.echo.load(Ordering::SeqCst) {
            let mut printed = false;
            self.with_bar(|pb| {
                pb.println(text);
                printed = true;
            });
            if !printed {
                eprintln!("{text}");
            }
        } else {
            self.with_bar(|pb| pb.set_message(truncate_message(text, 60)));
        }
    }
}

impl EventObserver for Progress {
    fn on_event(&self, event: &Event) {
        if self.quiet {
            return;
        }

        match event {
            Event::Started => self.begin(),
            Event::Pending => self.with_bar(|pb| pb.set_message("Hashing")),
            Event::Progress {
                completed,
                dispatched,
            } => self.with_bar(|pb| {
                pb.set_length(*dispatched);
                pb.set_position(*completed);
            }),
            Event::Message(text) => self.message(text),
            Event::Finished => self.end(),
            Event::DuplicateReport(_) | Event::Missing(_) | Event::New(_) => {}
        }
    }
}

/// Shorten a message for display next to the spinner, keeping its tail.
fn truncate_message(text: &str, max_len: usize) -> String {
    let count = text.chars().count();
    if count <= max_len {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - max_len.saturating_sub(3)).collect();
    format!("...{tail}")
}
