//! Duration parsing
//!
//! Attributes such as `early_renewal_duration` and the `timeouts` block
//! accept Go-style duration strings (`"1h30m"`, `"9480h0m0s"`) and some also
//! accept ISO-8601 durations (`"P90D"`, `"PT12H"`).

use chrono::{DateTime, Months, Utc};
use std::time::Duration;

/// Parses a Go-style duration string such as `"300ms"`, `"1.5h"` or `"2h45m"`.
pub fn parse_go_duration(s: &str) -> Result<Duration, String> {
    let input = s.trim();
    let body = input.strip_prefix('+').unwrap_or(input);
    if body.starts_with('-') {
        return Err(format!("negative duration {s:?}"));
    }
    if body == "0" {
        return Ok(Duration::ZERO);
    }
    if body.is_empty() {
        return Err(format!("invalid duration {s:?}"));
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = body;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {s:?}"))?;
        if number_len == 0 {
            return Err(format!("invalid duration {s:?}"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration {s:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            unit => return Err(format!("unknown unit {unit:?} in duration {s:?}")),
        };
        total_nanos += value * scale;
        rest = &rest[unit_len..];
    }

    let total_nanos = total_nanos.round();
    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("duration {s:?} out of range"));
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}

/// Formats a duration the way Go prints `time.Duration` (`"3m0s"`, `"500ms"`).
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", trim_fraction(nanos as f64 / 1e3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", trim_fraction(nanos as f64 / 1e6));
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = (total_secs % 60) as f64 + f64::from(d.subsec_nanos()) / 1e9;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{}s", trim_fraction(seconds)));
    out
}

fn trim_fraction(value: f64) -> String {
    let formatted = format!("{value:.9}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// A duration that may carry calendar components (years, months, days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalendarDuration {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub fixed: Duration,
}

impl CalendarDuration {
    /// Parses either a Go duration or an ISO-8601 duration (`PnYnMnWnDTnHnMnS`).
    pub fn parse(s: &str) -> Result<Self, String> {
        if let Ok(fixed) = parse_go_duration(s) {
            return Ok(Self {
                fixed,
                ..Self::default()
            });
        }
        Self::parse_iso8601(s)
    }

    fn parse_iso8601(s: &str) -> Result<Self, String> {
        let invalid = || format!("invalid duration {s:?}");
        let body = s.trim().strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() || body == "T" {
            return Err(invalid());
        }

        let mut result = Self::default();
        let mut in_time = false;
        let mut number = String::new();
        let mut seconds: f64 = 0.0;
        for c in body.chars() {
            match c {
                'T' if !in_time && number.is_empty() => in_time = true,
                '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
                unit => {
                    let value: f64 = number.parse().map_err(|_| invalid())?;
                    number.clear();
                    match (in_time, unit) {
                        (false, 'Y') => {
                            result.years = add(result.years, value, 1).ok_or_else(invalid)?
                        }
                        (false, 'M') => {
                            result.months = add(result.months, value, 1).ok_or_else(invalid)?
                        }
                        (false, 'W') => {
                            result.days = add(result.days, value, 7).ok_or_else(invalid)?
                        }
                        (false, 'D') => {
                            result.days = add(result.days, value, 1).ok_or_else(invalid)?
                        }
                        (true, 'H') => seconds += value * 3600.0,
                        (true, 'M') => seconds += value * 60.0,
                        (true, 'S') => seconds += value,
                        _ => return Err(invalid()),
                    }
                }
            }
        }
        if !number.is_empty() {
            return Err(invalid());
        }
        result.fixed = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
        Ok(result)
    }

    /// Returns `t` moved back by this duration.
    pub fn sub_from(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let t = t.checked_sub_months(Months::new(months))?;
        let t = t.checked_sub_signed(chrono::Duration::try_days(i64::from(self.days))?)?;
        t.checked_sub_signed(chrono::Duration::from_std(self.fixed).ok()?)
    }
}

/// `total + value * factor` for a whole, non-negative `value` that fits.
fn add(total: u32, value: f64, factor: u32) -> Option<u32> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    (value as u32).checked_mul(factor)?.checked_add(total)
}
