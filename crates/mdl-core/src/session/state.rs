//! Per-session job state machine.

use std::fmt;

/// `idle -> awaiting_info -> info_ready -> downloading -> {complete | error}`.
/// Any state returns to `idle` when the user starts a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingInfo,
    InfoReady,
    Downloading,
    Complete,
    Error,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle, AwaitingInfo)
                | (AwaitingInfo, InfoReady)
                | (AwaitingInfo, Error)
                | (InfoReady, Downloading)
                | (Downloading, Complete)
                | (Downloading, Error)
        )
    }

    /// Terminal for the current job; only a new job leaves it.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingInfo => "awaiting_info",
            SessionState::InfoReady => "info_ready",
            SessionState::Downloading => "downloading",
            SessionState::Complete => "complete",
            SessionState::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
