//! Timing arithmetic shared by the supervisor and the progress bar.
//!
//! All progress and duration values are expressed in centiseconds.

/// Placeholder shown when a duration is unknown or too small to display.
pub const CLOCK_PLACEHOLDER: &str = "--:--:--";

/// Column width that formatted throughput strings are aligned to.
pub const THROUGHPUT_WIDTH: usize = 9;

/// Convert an `HH:MM:SS.FF` timestamp to centiseconds.
///
/// The fractional digits are taken verbatim as centiseconds, which is only
/// exact for two-digit fractions: `00:00:01.5` yields `105`, not `150`.
/// Returns `None` when the result does not fit in a `u64`.
///
/// # Examples
///
/// ```
/// use m3u8dl_common::timecode::centiseconds;
///
/// assert_eq!(centiseconds("00:01:02.50"), Some(6350));
/// assert_eq!(centiseconds("01:00:00.00"), Some(360_000));
/// assert_eq!(centiseconds("garbage"), None);
/// ```
pub fn centiseconds(stamp: &str) -> Option<u64> {
    let mut parts = stamp.split([':', '.']);
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    let fraction: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    hours
        .checked_mul(360_000)?
        .checked_add(minutes.checked_mul(6_000)?)?
        .checked_add(seconds.checked_mul(100)?)?
        .checked_add(fraction)
}

/// Format a number of seconds as a zero-padded `HH:MM:SS` clock.
///
/// Returns [`CLOCK_PLACEHOLDER`] when `secs` is below one second or not
/// finite. Partial seconds are truncated.
pub fn format_clock(secs: f64) -> String {
    if !secs.is_finite() || secs < 1.0 {
        return CLOCK_PLACEHOLDER.to_string();
    }
    let total = secs as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Format a transfer rate with a unit-appropriate scale, right-aligned to
/// [`THROUGHPUT_WIDTH`] columns.
///
/// Rates below 800 B/s are shown in bytes, below 800,000 B/s in kilobytes,
/// otherwise in megabytes. Scaled values carry one decimal place unless it
/// is zero.
///
/// # Examples
///
/// ```
/// use m3u8dl_common::timecode::format_throughput;
///
/// assert_eq!(format_throughput(500.0), "   500B/s");
/// assert_eq!(format_throughput(1_500.0), "  1.5KB/s");
/// assert_eq!(format_throughput(2_000_000.0), "    2MB/s");
/// ```
pub fn format_throughput(bytes_per_sec: f64) -> String {
    let speed = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec.round() as u64
    } else {
        0
    };

    let text = if speed < 800 {
        format!("{speed}B/s")
    } else if speed < 800_000 {
        scaled(speed, 100, "KB/s")
    } else {
        scaled(speed, 100_000, "MB/s")
    };

    format!("{text:>width$}", width = THROUGHPUT_WIDTH)
}

/// Render `speed / (divisor * 10)` with a single optional decimal digit.
fn scaled(speed: u64, divisor: u64, unit: &str) -> String {
    let tenths = (speed as f64 / divisor as f64).round() as u64;
    let whole = tenths / 10;
    match tenths % 10 {
        0 => format!("{whole}{unit}"),
        digit => format!("{whole}.{digit}{unit}"),
    }
}
