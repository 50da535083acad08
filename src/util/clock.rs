//! Clock helpers and relative date parsing.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::core::ControllerError;

/// Longest delay a task can be scheduled with; about a century.
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// The instant `delay` from now, or `None` past [`MAX_DELAY`] or the
/// platform's clock range.
#[must_use]
pub fn deadline(delay: Duration) -> Option<Instant> {
    if delay > MAX_DELAY {
        return None;
    }
    Instant::now().checked_add(delay)
}

/// Like [`deadline`], clamping delays the clock cannot represent.
#[must_use]
pub fn saturating_deadline(delay: Duration) -> Instant {
    let now = Instant::now();
    let mut delay = delay.min(MAX_DELAY);
    loop {
        if let Some(due) = now.checked_add(delay) {
            return due;
        }
        delay /= 2;
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Run identifier derived from the wall clock.
#[must_use]
pub fn run_stamp() -> String {
    format!("run-{}", now_ms())
}

/// Parse a relative date such as `"500ms"`, `"1s"`, `"1.5s"`, `"2m"` or `"1h"`.
///
/// A bare number is read as seconds.
///
/// # Errors
///
/// Returns `ControllerError::InvalidDate` for empty input, unknown units,
/// malformed numbers and delays beyond [`MAX_DELAY`].
pub fn parse_delay(input: &str) -> Result<Duration, ControllerError> {
    let invalid = || ControllerError::InvalidDate(input.to_string());

    let s = input.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    if number.is_empty() {
        return Err(invalid());
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let secs = match unit {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(invalid()),
    };

    match Duration::try_from_secs_f64(secs) {
        Ok(delay) if delay <= MAX_DELAY => Ok(delay),
        _ => Err(invalid()),
    }
}
