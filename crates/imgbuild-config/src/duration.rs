//! Duration strings such as `5m`, `1h30m` or `300ms`
//!
//! A duration is a sequence of decimal numbers, each with an optional
//! fraction and a mandatory unit. Valid units are `ns`, `us` (or `µs`),
//! `ms`, `s`, `m` and `h`. The bare string `0` is also accepted.
//! Negative durations are rejected since every consumer is a timeout.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+\.?[0-9]*|\.[0-9]+)([a-zA-Zµ]+)?").expect("Invalid duration regex")
});

/// Why a duration string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("negative durations are not allowed")]
    Negative,

    #[error("invalid duration syntax near '{rest}'")]
    Syntax { rest: String },

    #[error("missing unit in duration (expected one of ns, us, ms, s, m, h)")]
    MissingUnit,

    #[error("unknown unit '{unit}' in duration")]
    UnknownUnit { unit: String },

    #[error("duration out of range")]
    Overflow,
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(DurationError::Empty);
    }
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if rest.starts_with('-') {
        return Err(DurationError::Negative);
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let caps = SEGMENT.captures(rest).ok_or_else(|| DurationError::Syntax {
            rest: rest.to_string(),
        })?;
        let number = &caps[1];
        let unit = caps.get(2).ok_or(DurationError::MissingUnit)?.as_str();
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| DurationError::Overflow)?
        };
        let mut nanos = whole.checked_mul(scale).ok_or(DurationError::Overflow)?;

        // Fractional digits past nanosecond precision are dropped.
        let mut place = scale;
        for digit in fraction.chars() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos = nanos
                .checked_add(u128::from(digit.to_digit(10).unwrap_or(0)) * place)
                .ok_or(DurationError::Overflow)?;
        }

        total = total.checked_add(nanos).ok_or(DurationError::Overflow)?;
        rest = &rest[caps[0].len()..];
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| DurationError::Overflow)?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}
