//! Blocking libcurl subscriber for `GET /progress/{id}`.
//!
//! Runs on the blocking pool. Each connection feeds an [`SseParser`]; decoded
//! events go to the [`StreamFeed`]. When the connection fails or the server
//! ends the response, a `Fault` is reported and the subscriber reconnects
//! after a backoff delay. Only consumer-side cancellation ends the loop.

use curl::easy::{Easy, List};
use std::cell::Cell;
use std::time::{Duration, Instant};

use super::backoff::describe_curl_error;
use super::{SseParser, StreamFeed, StreamItem, StreamOptions};
use crate::model::JobId;

/// Granularity of cancellation checks while waiting to reconnect.
const CANCEL_CHECK: Duration = Duration::from_millis(100);

/// Why one connection ended.
enum Ended {
    /// The consumer closed the stream.
    Cancelled,
    /// Server finished the response (status code attached).
    Closed(u32),
    Failed(curl::Error),
}

pub(super) fn run(url: &str, job: &JobId, feed: &StreamFeed, opts: &StreamOptions) {
    let mut policy = opts.reconnect;
    let mut failures = 0u32;
    let mut connection = 0u32;

    loop {
        connection += 1;
        tracing::debug!(job = %job, connection, "progress stream connecting");
        let mut parser = SseParser::new();
        let mut delivered = 0usize;
        let ended = connect_once(url, feed, opts, &mut parser, &mut delivered);
        if let Some(retry) = parser.take_retry() {
            policy = policy.with_base(retry);
        }

        let reason = match ended {
            Ended::Cancelled => break,
            _ if feed.is_cancelled() => break,
            Ended::Closed(code) if (200..300).contains(&code) => "server ended the stream".to_string(),
            Ended::Closed(code) => format!("HTTP {code}"),
            Ended::Failed(e) => format!("{} error: {}", describe_curl_error(&e), e),
        };

        if delivered > 0 {
            failures = 0;
        }
        failures += 1;
        let delay = policy.delay(failures);
        tracing::debug!(job = %job, delivered, failures, ?delay, "progress stream dropped: {}", reason);
        if !feed.blocking_send(StreamItem::Fault(reason)) {
            break;
        }
        if wait_unless_cancelled(feed, delay) {
            break;
        }
    }
    tracing::debug!(job = %job, "progress stream subscriber stopped");
}

/// Sleeps for `delay`; returns true early if the consumer cancels meanwhile.
fn wait_unless_cancelled(feed: &StreamFeed, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if feed.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(CANCEL_CHECK.min(deadline - now));
    }
}

fn connect_once(
    url: &str,
    feed: &StreamFeed,
    opts: &StreamOptions,
    parser: &mut SseParser,
    delivered: &mut usize,
) -> Ended {
    match stream_events(url, feed, opts, parser, delivered) {
        _ if feed.is_cancelled() => Ended::Cancelled,
        Ok(code) => Ended::Closed(code),
        Err(e) => Ended::Failed(e),
    }
}

fn stream_events(
    url: &str,
    feed: &StreamFeed,
    opts: &StreamOptions,
    parser: &mut SseParser,
    delivered: &mut usize,
) -> Result<u32, curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // No overall timeout: the response lives as long as the job.
    easy.progress(true)?;

    let mut list = List::new();
    list.append("Accept: text/event-stream")?;
    list.append("Cache-Control: no-cache")?;
    easy.http_headers(list)?;

    // Status of the final response; bodies of error responses are not events.
    let status = Cell::new(0u32);
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(code) = parse_status_line(line) {
                status.set(code);
            }
            true
        })?;
        transfer.progress_function(|_, _, _, _| !feed.is_cancelled())?;
        transfer.write_function(|data| {
            if feed.is_cancelled() {
                return Ok(0);
            }
            if !(200..300).contains(&status.get()) {
                return Ok(data.len());
            }
            for message in parser.feed(data) {
                if !feed.blocking_send(StreamItem::Message(message)) {
                    return Ok(0);
                }
                *delivered += 1;
            }
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    easy.response_code()
}

/// `HTTP/1.1 200 OK` -> 200.
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}
