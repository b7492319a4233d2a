//! Incremental `text/event-stream` parser.
//!
//! Bytes arrive in arbitrary chunks. Complete lines are processed as they
//! appear; an event is dispatched on a blank line. Only unnamed events and
//! events named `message` are delivered. `retry:` is remembered for the
//! reconnect logic; `id:` and comments are ignored.

use std::time::Duration;

#[derive(Debug, Default)]
pub struct SseParser {
    /// Bytes of a line that has not been terminated yet.
    pending: Vec<u8>,
    data: String,
    has_data: bool,
    event: String,
    retry: Option<Duration>,
    started: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the data of every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(data) = self.process_line(&line) {
                events.push(data);
            }
        }
        self.pending.extend_from_slice(rest);
        events
    }

    /// Reconnect delay requested by the server, consumed once.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<String> {
        let mut line = String::from_utf8_lossy(raw);
        if !self.started {
            self.started = true;
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string().into();
            }
        }
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (&line[..], ""),
        };
        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = value.to_string(),
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event = std::mem::take(&mut self.event);
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        let data = std::mem::take(&mut self.data);
        if event.is_empty() || event == "message" {
            Some(data)
        } else {
            tracing::trace!(event = %event, "ignoring named event");
            None
        }
    }
}
