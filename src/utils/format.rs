//! Remaining-time display strings

/// Shown by countdown displays once a run reaches zero
pub const COMPLETE: &str = "Complete!";

/// Countdown display: `MM:SS`, or `H:MM:SS` once an hour or more remains.
/// Zero renders as [`COMPLETE`].
pub fn format_countdown(ms: u64) -> String {
    if ms == 0 {
        return COMPLETE.to_string();
    }
    clock_digits(ms)
}

/// Same digits as [`format_countdown`], but zero renders as `00:00:00`
pub fn format_clock(ms: u64) -> String {
    if ms == 0 {
        return "00:00:00".to_string();
    }
    clock_digits(ms)
}

/// Compact display: `09m 30s`, or `1h 05m 00s` once an hour or more remains
pub fn format_compact(ms: u64) -> String {
    let (hours, minutes, seconds) = split(ms);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else {
        format!("{:02}m {:02}s", minutes, seconds)
    }
}

fn clock_digits(ms: u64) -> String {
    let (hours, minutes, seconds) = split(ms);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn split(ms: u64) -> (u64, u64, u64) {
    let total_seconds = ms / 1000;
    (total_seconds / 3600, (total_seconds % 3600) / 60, total_seconds % 60)
}
