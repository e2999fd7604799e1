//! Parser for Go-style duration strings such as `1m`, `90s` or `1h30m`.
//!
//! Negative durations are accepted and clamp to zero so a poll loop given
//! one fails on its first deadline check.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;
const MAX_FRACTION_DIGITS: usize = 18;

/// Reasons a duration string is rejected.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DurationError {
    /// The input was empty after trimming.
    #[error("empty duration")]
    Empty,
    /// A component did not start with a number.
    #[error("invalid duration {0:?}")]
    Invalid(String),
    /// A number had no unit attached.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    /// The unit is not one of `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// Offending unit text.
        unit: String,
        /// Whole input string.
        input: String,
    },
    /// The value does not fit in a [`Duration`].
    #[error("duration {0:?} overflows")]
    Overflow(String),
}

/// Parses a duration string using Go `time.ParseDuration` syntax.
///
/// # Errors
///
/// Returns [`DurationError`] when the input is empty, malformed, uses an
/// unknown unit, or overflows.
pub fn parse_duration(raw: &str) -> Result<Duration, DurationError> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    if body.is_empty() {
        return Err(DurationError::Empty);
    }
    if body == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    let mut chars = body.chars().peekable();
    while chars.peek().is_some() {
        let mut whole = String::new();
        let mut fraction = String::new();
        let mut seen_dot = false;
        while let Some(&ch) = chars.peek() {
            if ch.is_ascii_digit() {
                if seen_dot {
                    fraction.push(ch);
                } else {
                    whole.push(ch);
                }
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
            } else {
                break;
            }
            chars.next();
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(DurationError::Invalid(raw.to_owned()));
        }

        let mut unit = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                break;
            }
            unit.push(ch);
            chars.next();
        }
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(raw.to_owned()));
        }
        let scale = unit_nanos(&unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.clone(),
            input: raw.to_owned(),
        })?;

        let component = component_nanos(&whole, &fraction, scale)
            .ok_or_else(|| DurationError::Overflow(raw.to_owned()))?;
        total = total
            .checked_add(component)
            .ok_or_else(|| DurationError::Overflow(raw.to_owned()))?;
    }

    if negative {
        return Ok(Duration::ZERO);
    }
    let nanos = u64::try_from(total).map_err(|_| DurationError::Overflow(raw.to_owned()))?;
    Ok(Duration::from_nanos(nanos))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

#[expect(
    clippy::integer_division,
    reason = "fractional components are truncated to whole nanoseconds"
)]
fn component_nanos(whole: &str, fraction: &str, scale: u128) -> Option<u128> {
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };
    let mut nanos = whole_value.checked_mul(scale)?;

    let digits: String = fraction.chars().take(MAX_FRACTION_DIGITS).collect();
    if !digits.is_empty() {
        let fraction_value: u128 = digits.parse().ok()?;
        let denominator = 10_u128.checked_pow(u32::try_from(digits.len()).ok()?)?;
        nanos = nanos.checked_add(fraction_value.checked_mul(scale)? / denominator)?;
    }
    Some(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1m", Duration::from_secs(60))]
    #[case("30s", Duration::from_secs(30))]
    #[case("6m", Duration::from_secs(360))]
    #[case("1h30m", Duration::from_secs(5400))]
    #[case("1.5h", Duration::from_secs(5400))]
    #[case("500ms", Duration::from_millis(500))]
    #[case("250us", Duration::from_micros(250))]
    #[case("0", Duration::ZERO)]
    #[case("-5s", Duration::ZERO)]
    #[case(" 2m ", Duration::from_secs(120))]
    fn parses_go_durations(#[case] input: &str, #[case] expected: Duration) {
        let parsed = parse_duration(input).unwrap_or_else(|err| panic!("{input}: {err}"));
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("tubes")]
    #[case("")]
    #[case("5")]
    #[case("5 parsecs")]
    #[case("1m30")]
    #[case(".s")]
    fn rejects_malformed_durations(#[case] input: &str) {
        assert!(
            parse_duration(input).is_err(),
            "{input:?} should not parse"
        );
    }

    #[test]
    fn reports_unknown_unit() {
        let err = parse_duration("3d").expect_err("days are not a Go unit");
        assert_eq!(
            err,
            DurationError::UnknownUnit {
                unit: String::from("d"),
                input: String::from("3d"),
            }
        );
    }

    #[test]
    fn rejects_overflow() {
        let err = parse_duration("99999999999999999999h").expect_err("should overflow");
        assert!(matches!(err, DurationError::Overflow(_)));
    }
}
