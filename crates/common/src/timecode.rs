//! Timestamp codec for clock-style time values.
//!
//! Converts between textual clock timestamps (`H:MM:SS.mmm`, `MM:SS.mmm`,
//! `SS.mmm`) and numeric second offsets. Both `.` and `,` are accepted as the
//! fractional separator so subtitle-file timestamps parse unchanged.

/// Reasons a timestamp string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimecodeError {
    #[error("timestamp is empty")]
    Empty,

    #[error("timestamp has {0} components (at most 3 allowed)")]
    TooManyComponents(usize),

    #[error("invalid {field} component: {value:?}")]
    InvalidComponent { field: &'static str, value: String },

    #[error("{field} component out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// Parse a clock timestamp into seconds, failing closed.
///
/// Unparsable input yields `0.0` and a warning is logged, so a malformed
/// value never travels downstream looking like a valid time.
pub fn parse_timestamp(text: &str) -> f64 {
    match try_parse_timestamp(text) {
        Ok(secs) => secs,
        Err(err) => {
            tracing::warn!(input = text, error = %err, "Unparsable timestamp, using 0");
            0.0
        }
    }
}

/// Parse a clock timestamp into seconds.
///
/// Missing higher components default to zero: `"5.5"`, `"0:05.5"` and
/// `"0:00:05,500"` all yield `5.5`.
pub fn try_parse_timestamp(text: &str) -> Result<f64, TimecodeError> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(TimecodeError::Empty);
    }

    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() > 3 {
        return Err(TimecodeError::TooManyComponents(parts.len()));
    }

    let (hours, minutes, seconds) = match parts.as_slice() {
        [s] => ("0", "0", *s),
        [m, s] => ("0", *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => unreachable!("split yields at least one part"),
    };

    let hours = parse_whole(hours, "hours")?;
    let minutes = parse_whole(minutes, "minutes")?;
    let seconds = parse_fractional(seconds)?;

    if parts.len() >= 2 && seconds >= 60.0 {
        return Err(TimecodeError::OutOfRange {
            field: "seconds",
            value: seconds.to_string(),
        });
    }
    if parts.len() == 3 && minutes >= 60 {
        return Err(TimecodeError::OutOfRange {
            field: "minutes",
            value: minutes.to_string(),
        });
    }

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Format seconds as `HH:MM:SS.mmm`.
///
/// Milliseconds are rounded, not truncated. Negative or non-finite input
/// formats as zero.
pub fn format_timestamp(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Format seconds as the subtitle-file form `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Round seconds to whole milliseconds.
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

fn split_millis(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    };
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

fn parse_whole(value: &str, field: &'static str) -> Result<u64, TimecodeError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimecodeError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    value
        .parse::<u64>()
        .map_err(|_| TimecodeError::OutOfRange {
            field,
            value: value.to_string(),
        })
}

fn parse_fractional(value: &str) -> Result<f64, TimecodeError> {
    let value = value.trim();
    let invalid = || TimecodeError::InvalidComponent {
        field: "seconds",
        value: value.to_string(),
    };

    let digits = value.bytes().filter(|b| b.is_ascii_digit()).count();
    let dots = value.bytes().filter(|b| *b == b'.').count();
    if digits == 0 || dots > 1 || digits + dots != value.len() {
        return Err(invalid());
    }

    value.parse::<f64>().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_all_shapes() {
        assert!((parse_timestamp("5.5") - 5.5).abs() < 1e-9);
        assert!((parse_timestamp("01:05.250") - 65.25).abs() < 1e-9);
        assert!((parse_timestamp("1:01:01.500") - 3661.5).abs() < 1e-9);
        assert!((parse_timestamp("00:00:02,775") - 2.775).abs() < 1e-9);
        assert!((parse_timestamp("  12  ") - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_fails_closed() {
        assert_eq!(parse_timestamp(""), 0.0);
        assert_eq!(parse_timestamp("abc"), 0.0);
        assert_eq!(parse_timestamp("1:2:3:4"), 0.0);
        assert_eq!(parse_timestamp("-3.0"), 0.0);
        assert_eq!(parse_timestamp("00:75.0"), 0.0);
        assert_eq!(parse_timestamp("nan"), 0.0);
    }

    #[test]
    fn test_strict_parse_reports_reason() {
        assert_eq!(try_parse_timestamp("   "), Err(TimecodeError::Empty));
        assert_eq!(
            try_parse_timestamp("1:2:3:4"),
            Err(TimecodeError::TooManyComponents(4))
        );
        assert!(matches!(
            try_parse_timestamp("1:75:00"),
            Err(TimecodeError::OutOfRange {
                field: "minutes",
                ..
            })
        ));
    }

    #[test]
    fn test_format_rounds_millis() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(3661.5), "01:01:01.500");
        assert_eq!(format_timestamp(1.0006), "00:00:01.001");
        assert_eq!(format_timestamp(59.9996), "00:01:00.000");
        assert_eq!(format_timestamp(-4.0), "00:00:00.000");
        assert_eq!(format_srt_timestamp(2.775), "00:00:02,775");
    }

    #[test]
    fn test_format_parse_reproduces_input() {
        for input in ["00:00:00.605", "00:12:34.567", "23:59:59.999", "01:00:00.000"] {
            assert_eq!(format_timestamp(parse_timestamp(input)), input);
        }
    }

    proptest! {
        #[test]
        fn prop_timestamp_round_trip(ms in 0u64..86_400_000) {
            let secs = ms as f64 / 1000.0;
            let formatted = format_timestamp(secs);
            prop_assert_eq!(format_timestamp(parse_timestamp(&formatted)), formatted);
        }

        #[test]
        fn prop_srt_form_parses_to_same_time(ms in 0u64..86_400_000) {
            let secs = ms as f64 / 1000.0;
            let srt = format_srt_timestamp(secs);
            prop_assert_eq!(format_timestamp(parse_timestamp(&srt)), format_timestamp(secs));
        }
    }
}
