//! Timestamps on the command line and in logs.
//!
//! Parsed timestamps are microseconds, which is also what the formatters take.

/// Parses `SS`, `MM:SS` or `HH:MM:SS` into microseconds. Negative fields are rejected.
pub fn parse_time(s: &str) -> Option<i64> {
    let parts = s.trim().split(':').map(|p| p.parse::<u32>().ok().map(i64::from)).collect::<Option<Vec<i64>>>()?;
    Some(match parts[..] {
        [hh, mm, ss] => hh * 3600 + mm * 60 + ss,
        [mm, ss] => mm * 60 + ss,
        [ss] => ss,
        _ => return None,
    } * 1_000_000)
}

/// `HH:MM:SS.uuuuuu`
pub fn pprint_ts(ts: i64) -> String {
    format!("{:02}:{:02}:{:02}.{:06}",
        ts / (3600 * 1_000_000),
        ts / (60 * 1_000_000) % 60,
        ts / (1_000_000) % 60,
        ts % 1_000_000
    )
}

/// `HH:MM:SS`, rounded down to the second.
pub fn hms(secs: f64) -> String {
    let secs = secs.max(0.0) as i64;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

pub fn secs_to_us(secs: f64) -> i64 {
    (secs * 1_000_000.0).round() as i64
}

pub fn us_to_secs(us: i64) -> f64 {
    us as f64 / 1_000_000.0
}
