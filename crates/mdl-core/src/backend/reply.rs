//! Decode JSON reply bodies, splitting off `{error}` payloads.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::BackendError;

/// Decode a reply body. The service reports failures as `{"error": "..."}`
/// with a 4xx/5xx status, so the body is inspected before the status.
pub(crate) fn decode_reply<T: DeserializeOwned>(status: u32, body: &[u8]) -> Result<T, BackendError> {
    let ok_status = (200..300).contains(&status);
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) if !ok_status => return Err(BackendError::Http { status }),
        Err(e) => return Err(BackendError::Decode(e)),
    };
    if let Some(message) = server_error(&value) {
        return Err(BackendError::Server(message));
    }
    if !ok_status {
        return Err(BackendError::Http { status });
    }
    Ok(serde_json::from_value(value)?)
}

/// A truthy `error` member, rendered as text.
fn server_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artifact, MediaInfo};

    #[test]
    fn error_payload_wins_over_status() {
        let r = decode_reply::<MediaInfo>(500, br#"{"error":"Video unavailable"}"#);
        assert!(matches!(r, Err(BackendError::Server(ref m)) if m == "Video unavailable"));
        let r = decode_reply::<MediaInfo>(200, br#"{"error":"Please provide a URL"}"#);
        assert!(matches!(r, Err(BackendError::Server(_))));
    }

    #[test]
    fn non_json_error_status_is_http() {
        let r = decode_reply::<MediaInfo>(502, b"<html>Bad Gateway</html>");
        assert!(matches!(r, Err(BackendError::Http { status: 502 })));
        let r = decode_reply::<MediaInfo>(404, br#"{"detail":"nope"}"#);
        assert!(matches!(r, Err(BackendError::Http { status: 404 })));
    }

    #[test]
    fn bad_success_body_is_decode_error() {
        let r = decode_reply::<Artifact>(200, b"not json");
        assert!(matches!(r, Err(BackendError::Decode(_))));
        let r = decode_reply::<Artifact>(200, br#"{"title":"missing url"}"#);
        assert!(matches!(r, Err(BackendError::Decode(_))));
    }

    #[test]
    fn falsy_error_members_are_ignored() {
        let info: MediaInfo =
            decode_reply(200, br#"{"error":"","title":"Clip","author":"me"}"#).unwrap();
        assert_eq!(info.title.as_deref(), Some("Clip"));
        let info: MediaInfo = decode_reply(200, br#"{"error":null,"title":"Clip"}"#).unwrap();
        assert_eq!(info.title.as_deref(), Some("Clip"));
    }
}
