//! Graphite interval strings
//!
//! Parses strings like `"7d"`, `"-1h"`, `"30s"`, `"1h30min"` into seconds.
//! Units: `s`, `min`, `h`, `d`, `w`, `mon` (30 days) and `y` (365 days),
//! each also accepted in its long and plural forms. A bare `m` means minutes.

use crate::error::{Error, Result};

/// Parse an interval string into signed seconds
///
/// `default_sign` applies when the string carries no explicit sign: time
/// shifts default to the past (`-1`), windows to the future (`1`).
pub fn parse_interval(s: &str, default_sign: i64) -> Result<i64> {
    let raw = s.trim();
    let (sign, body) = match raw.as_bytes().first() {
        Some(b'-') => (-1, &raw[1..]),
        Some(b'+') => (1, &raw[1..]),
        _ => (if default_sign < 0 { -1 } else { 1 }, raw),
    };

    if body.is_empty() {
        return Err(invalid(s));
    }

    let mut total = 0i64;
    let mut rest = body;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid(s));
        }
        let n: i64 = rest[..digits].parse().map_err(|_| invalid(s))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let seconds = unit_seconds(unit).ok_or_else(|| invalid(s))?;
        total = n
            .checked_mul(seconds)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| invalid(s))?;
    }

    Ok(sign * total)
}

fn unit_seconds(unit: &str) -> Option<i64> {
    let seconds = match unit.to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        "w" | "week" | "weeks" => 7 * 86_400,
        "mon" | "month" | "months" => 30 * 86_400,
        "y" | "year" | "years" => 365 * 86_400,
        _ => return None,
    };
    Some(seconds)
}

fn invalid(s: &str) -> Error {
    Error::InvalidArgument(format!("invalid interval: {:?}", s))
}
