//! Nanosecond timestamp formatting and parsing.
//!
//! Matroska stores everything in (scaled) nanoseconds, so the engine works
//! with plain `i64` nanosecond values and only needs a textual form for
//! logs, tags and chapter files.

use crate::error::{Error, Result};

/// Nanoseconds per millisecond.
pub const NS_PER_MS: i64 = 1_000_000;

/// Nanoseconds per second.
pub const NS_PER_SECOND: i64 = 1_000_000_000;

/// Format as `HH:MM:SS.nnnnnnnnn`.
pub fn format_timestamp(ns: i64) -> String {
    format_timestamp_with_precision(ns, 9)
}

/// Format as `HH:MM:SS` followed by `precision` fractional digits (0-9).
///
/// The fraction is truncated, not rounded.
pub fn format_timestamp_with_precision(ns: i64, precision: usize) -> String {
    let sign = if ns < 0 { "-" } else { "" };
    let abs = ns.unsigned_abs();
    let seconds = abs / NS_PER_SECOND as u64;
    let fraction = abs % NS_PER_SECOND as u64;

    let mut out = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    );

    let precision = precision.min(9);
    if precision > 0 {
        let digits = format!("{:09}", fraction);
        out.push('.');
        out.push_str(&digits[..precision]);
    }

    out
}

/// Parse a timestamp into nanoseconds.
///
/// Accepted forms:
/// - `[-]HH:MM:SS[.fraction]` and `[-]MM:SS[.fraction]` (up to nine digits)
/// - `[-]<number><unit>` with unit `h`, `min`, `s`, `ms`, `us` or `ns`;
///   the number may carry a fraction (`1.5s`)
pub fn parse_timestamp(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    if body.is_empty() {
        return Err(Error::invalid_timestamp(input, "empty"));
    }

    let value = if body.contains(':') {
        parse_clock(input, body)?
    } else {
        parse_with_unit(input, body)?
    };

    Ok(if negative { -value } else { value })
}

fn parse_clock(input: &str, body: &str) -> Result<i64> {
    let (clock, fraction) = match body.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (body, None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (parse_number(input, h)?, parse_number(input, m)?, parse_number(input, s)?),
        [m, s] => (0, parse_number(input, m)?, parse_number(input, s)?),
        _ => return Err(Error::invalid_timestamp(input, "expected HH:MM:SS")),
    };

    if minutes > 59 || seconds > 59 {
        return Err(Error::invalid_timestamp(input, "minutes and seconds must be below 60"));
    }

    let fraction_ns = match fraction {
        Some(f) => parse_fraction(input, f)?,
        None => 0,
    };

    Ok(((hours * 60 + minutes) * 60 + seconds) * NS_PER_SECOND + fraction_ns)
}

fn parse_with_unit(input: &str, body: &str) -> Result<i64> {
    let split = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| Error::invalid_timestamp(input, "missing unit"))?;
    let (number, unit) = body.split_at(split);

    let multiplier: i64 = match unit {
        "h" => 3600 * NS_PER_SECOND,
        "min" => 60 * NS_PER_SECOND,
        "s" => NS_PER_SECOND,
        "ms" => NS_PER_MS,
        "us" => 1_000,
        "ns" => 1,
        _ => return Err(Error::invalid_timestamp(input, format!("unknown unit '{unit}'"))),
    };

    match number.split_once('.') {
        None => Ok(parse_number(input, number)? * multiplier),
        Some((whole, fraction)) => {
            let whole = if whole.is_empty() { 0 } else { parse_number(input, whole)? };
            // Scale the fraction against the unit in nanoseconds.
            let fraction_ns = parse_fraction(input, fraction)?;
            let scaled = fraction_ns as i128 * multiplier as i128 / NS_PER_SECOND as i128;
            Ok(whole * multiplier + scaled as i64)
        }
    }
}

fn parse_number(input: &str, digits: &str) -> Result<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_timestamp(input, format!("'{digits}' is not a number")));
    }
    digits
        .parse::<i64>()
        .map_err(|e| Error::invalid_timestamp(input, e.to_string()))
}

fn parse_fraction(input: &str, digits: &str) -> Result<i64> {
    if digits.len() > 9 {
        return Err(Error::invalid_timestamp(input, "more than nine fractional digits"));
    }
    let value = parse_number(input, digits)?;
    Ok(value * 10_i64.pow(9 - digits.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00.000000000");
        assert_eq!(format_timestamp(3_723_500_000_000), "01:02:03.500000000");
        assert_eq!(format_timestamp(-40_000_000), "-00:00:00.040000000");
    }

    #[test]
    fn test_format_with_precision() {
        assert_eq!(format_timestamp_with_precision(61_234_567_890, 3), "00:01:01.234");
        assert_eq!(format_timestamp_with_precision(61_234_567_890, 0), "00:01:01");
    }

    #[test]
    fn test_parse_clock_forms() {
        assert_eq!(parse_timestamp("00:00:01").unwrap(), NS_PER_SECOND);
        assert_eq!(parse_timestamp("01:02:03.5").unwrap(), 3_723_500_000_000);
        assert_eq!(parse_timestamp("02:03.040").unwrap(), 123_040_000_000);
        assert_eq!(parse_timestamp("-00:00:00.040").unwrap(), -40_000_000);
    }

    #[test]
    fn test_parse_unit_forms() {
        assert_eq!(parse_timestamp("40ms").unwrap(), 40_000_000);
        assert_eq!(parse_timestamp("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(parse_timestamp("250us").unwrap(), 250_000);
        assert_eq!(parse_timestamp("-200ms").unwrap(), -200_000_000);
        assert_eq!(parse_timestamp("2min").unwrap(), 120 * NS_PER_SECOND);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("12").is_err());
        assert!(parse_timestamp("00:61:00").is_err());
        assert!(parse_timestamp("5 parsecs").is_err());
        assert!(parse_timestamp("00:00:00.1234567890").is_err());
    }
}
