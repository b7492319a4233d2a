//! Reconnect delays for the event stream.

use std::time::Duration;

/// Capped exponential backoff between stream reconnects.
///
/// The first reconnect waits `base`; each further consecutive failure doubles
/// the delay up to `max`. Callers reset their failure count after a message
/// gets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Server-requested base delay (`retry:` field).
    pub fn with_base(self, base: Duration) -> Self {
        Self::new(base, self.max)
    }

    /// Delay before reconnect number `failures` (1-based; 0 is treated as 1).
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = 1u32 << failures.saturating_sub(1).min(8);
        self.base.saturating_mul(exp).min(self.max)
    }
}

/// Coarse label for a curl failure, for logs and fault messages.
pub(crate) fn describe_curl_error(e: &curl::Error) -> &'static str {
    if e.is_operation_timedout() {
        return "timeout";
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return "connection";
    }
    "transfer"
}
