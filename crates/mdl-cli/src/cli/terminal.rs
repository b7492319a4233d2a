//! Session observer that renders to the terminal.
//!
//! Errors are not printed here; commands return them and `main` reports them once.

use mdl_core::session::{Presentation, ProgressView, SessionObserver};
use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Default)]
pub struct TerminalObserver {
    last_print: Mutex<Option<Instant>>,
}

impl TerminalObserver {
    /// True when a progress line is due (throttled, except for 100%).
    fn due(&self, progress: &ProgressView) -> bool {
        let mut last = self.last_print.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        let due = progress.percent.is_complete()
            || last.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL);
        if due {
            *last = Some(now);
        }
        due
    }
}

impl SessionObserver for TerminalObserver {
    fn progress(&self, progress: &ProgressView) {
        if !self.due(progress) {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r  {:>4}  {}  ", progress.percent.to_string(), progress.details);
        let _ = out.flush();
    }

    fn presented(&self, presentation: &Presentation) {
        println!();
        println!("{} {}", presentation.headline, presentation.message);
        println!("  {}", presentation.url);
        println!("  save as: {}", presentation.filename);
    }

    fn success(&self, message: &str) {
        println!("{message}");
    }

    fn alternatives(&self, alternatives: &[String]) {
        println!("Alternatives:");
        for alt in alternatives {
            println!("  {alt}");
        }
    }

    fn retry_offered(&self, _message: &str) {
        println!();
        println!("Run `mdl get` again to retry.");
    }
}
