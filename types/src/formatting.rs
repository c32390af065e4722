//! Display helpers for ticks and attribute values.
//!
//! The engine itself only ever deals in ticks; these helpers exist so the
//! shell and logs can show something a human can read.

/// Default length of one world tick in milliseconds.
pub const DEFAULT_TICK_MS: u32 = 100;

/// Convert a tick count to seconds for a given tick length.
///
/// # Examples
/// ```
/// use tickfx_types::formatting::ticks_to_secs;
/// assert_eq!(ticks_to_secs(25, 100), 2.5);
/// assert_eq!(ticks_to_secs(0, 100), 0.0);
/// ```
pub fn ticks_to_secs(ticks: u64, tick_ms: u32) -> f64 {
    ticks as f64 * tick_ms as f64 / 1000.0
}

/// Format a tick count as a wall-clock duration.
///
/// - Durations >= 60s: `M:SS`
/// - Shorter durations: seconds with one decimal place and an `s` suffix
///
/// # Examples
/// ```
/// use tickfx_types::formatting::format_ticks;
/// assert_eq!(format_ticks(25, 100), "2.5s");
/// assert_eq!(format_ticks(1_250, 100), "2:05");
/// assert_eq!(format_ticks(0, 100), "0.0s");
/// ```
pub fn format_ticks(ticks: u64, tick_ms: u32) -> String {
    let secs = ticks_to_secs(ticks, tick_ms);
    if secs >= 60.0 {
        format_duration_u64(secs.floor() as u64)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Format a duration as `M:SS` from u64 seconds.
///
/// # Examples
/// ```
/// use tickfx_types::formatting::format_duration_u64;
/// assert_eq!(format_duration_u64(125), "2:05");
/// assert_eq!(format_duration_u64(0), "0:00");
/// ```
pub fn format_duration_u64(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Format a modifier with an explicit sign.
///
/// # Examples
/// ```
/// use tickfx_types::formatting::format_signed;
/// assert_eq!(format_signed(3), "+3");
/// assert_eq!(format_signed(-2), "-2");
/// assert_eq!(format_signed(0), "0");
/// ```
pub fn format_signed(n: i32) -> String {
    if n > 0 { format!("+{}", n) } else { n.to_string() }
}

/// Format a number with thousands separators.
///
/// # Examples
/// ```
/// use tickfx_types::formatting::format_thousands;
/// assert_eq!(format_thousands(500), "500");
/// assert_eq!(format_thousands(1_500), "1,500");
/// assert_eq!(format_thousands(-1_500_000), "-1,500,000");
/// ```
pub fn format_thousands(n: i64) -> String {
    let s = n.unsigned_abs().to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3 + 1);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    if n < 0 {
        result.insert(0, '-');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ticks() {
        assert_eq!(format_ticks(1, 100), "0.1s");
        assert_eq!(format_ticks(599, 100), "59.9s");
        assert_eq!(format_ticks(600, 100), "1:00");
        assert_eq!(format_ticks(36_000, 100), "60:00");
        assert_eq!(format_ticks(10, 50), "0.5s");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed(i32::MAX), format!("+{}", i32::MAX));
        assert_eq!(format_signed(i32::MIN), i32::MIN.to_string());
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(i64::MIN), "-9,223,372,036,854,775,808");
    }
}
