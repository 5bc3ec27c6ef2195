//! Parsing of pipeline schedule expressions into a normalized interval.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RATE_RE: Regex =
        Regex::new(r"(?i)^rate\((\d+)\s+(minute|hour|day)s?\)$").unwrap();
    static ref CRON_RE: Regex =
        Regex::new(r"^cron\((\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\)$").unwrap();
    // Step expressions `*/N` and `0/N` are treated identically.
    static ref STEP_RE: Regex = Regex::new(r"^(?:\*|0)/(\d+)$").unwrap();
    static ref FIXED_RE: Regex = Regex::new(r"^\d+$").unwrap();
}

/// Parse a schedule expression into an interval in minutes.
///
/// Recognizes `rate(N minutes|hours|days)` and the six-field cron form
/// `cron(minute hour day-of-month month day-of-week year)`, of which only
/// the minute and hour fields are interpreted. Returns `None` for any other
/// shape, and for degenerate zero-length intervals.
pub fn parse_interval_minutes(expression: &str) -> Option<u32> {
    let expression = expression.trim();

    if let Some(caps) = RATE_RE.captures(expression) {
        let n: u32 = caps[1].parse().ok()?;
        let minutes = match caps[2].to_ascii_lowercase().as_str() {
            "minute" => n,
            "hour" => n * 60,
            "day" => n * 1440,
            _ => return None,
        };
        return (minutes > 0).then_some(minutes);
    }

    let caps = CRON_RE.captures(expression)?;
    let (minute, hour) = (&caps[1], &caps[2]);

    // Every N hours at a fixed minute, e.g. cron(0 */6 * * ? *).
    if let Some(step) = STEP_RE.captures(hour) {
        if FIXED_RE.is_match(minute) {
            let n: u32 = step[1].parse().ok()?;
            return (n > 0).then_some(n * 60);
        }
    }

    // Every N minutes, e.g. cron(*/15 * * * ? *).
    if let Some(step) = STEP_RE.captures(minute) {
        if hour == "*" {
            let n: u32 = step[1].parse().ok()?;
            return (n > 0).then_some(n);
        }
    }

    // A fixed minute and hour runs once per day, e.g. cron(0 3 * * ? *).
    if FIXED_RE.is_match(minute) && FIXED_RE.is_match(hour) {
        return Some(1440);
    }

    None
}
