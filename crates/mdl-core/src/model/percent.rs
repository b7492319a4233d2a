//! Lenient percent decoding.
//!
//! The service sends integers, but older builds sent floats or numeric
//! strings. Anything that is not a number becomes 0; the result is always
//! clamped to [0, 100].

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Completion percentage in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const COMPLETE: Percent = Percent(100);

    /// Clamp any integer into range.
    pub fn clamped(value: i64) -> Self {
        Percent(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self.0 >= 100
    }

    /// Interpret a loosely typed JSON value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Percent::clamped(i)
                } else {
                    n.as_f64().map(Percent::from_float).unwrap_or(Percent::ZERO)
                }
            }
            serde_json::Value::String(s) => Percent::clamped(parse_leading_int(s).unwrap_or(0)),
            _ => Percent::ZERO,
        }
    }

    fn from_float(f: f64) -> Self {
        if f.is_nan() {
            return Percent::ZERO;
        }
        Percent(f.trunc().clamp(0.0, 100.0) as u8)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Percent::from_json(&value))
    }
}

/// Leading base-10 integer of a string: optional whitespace and sign, then digits.
/// "42.7%" -> 42, " -3" -> -3, "abc" -> None.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = {
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() {
        return None;
    }
    // Saturate absurdly long digit runs; the value is clamped anyway.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
