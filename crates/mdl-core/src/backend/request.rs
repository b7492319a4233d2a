//! Blocking libcurl requests for the JSON endpoints.
//!
//! Runs in the current thread; callers wrap these in `spawn_blocking`.

use curl::easy::{Easy, List};
use std::time::Duration;

/// Timeouts applied to every JSON request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

/// Request body variants used by the service.
#[derive(Debug, Clone)]
pub(crate) enum Body {
    None,
    Json(Vec<u8>),
    Form(String),
}

/// Performs one request and returns `(status, body)`. Follows redirects.
pub(crate) fn perform(url: &str, body: &Body, opts: &RequestOptions) -> Result<(u32, Vec<u8>), curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.timeout)?;

    let mut list = List::new();
    list.append("Accept: application/json")?;
    match body {
        Body::None => {}
        Body::Json(bytes) => {
            easy.post(true)?;
            easy.post_fields_copy(bytes)?;
            list.append("Content-Type: application/json")?;
        }
        Body::Form(encoded) => {
            easy.post(true)?;
            easy.post_fields_copy(encoded.as_bytes())?;
            list.append("Content-Type: application/x-www-form-urlencoded")?;
        }
    }
    easy.http_headers(list)?;

    let mut received = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            received.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok((code, received))
}
