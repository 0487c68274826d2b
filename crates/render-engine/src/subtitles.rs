//! Subtitle file generation for the legacy burn-in path.

use std::fmt::Write as _;
use std::path::Path;

use clipburn_common::error::ClipResult;
use clipburn_common::timecode::format_srt_timestamp;
use clipburn_model::caption::Caption;

/// SRT content for normalized captions (times relative to the clip).
pub fn generate_srt(captions: &[Caption]) -> String {
    let mut output = String::new();

    for (i, caption) in captions.iter().enumerate() {
        let _ = writeln!(output, "{}", i + 1);
        let _ = writeln!(
            output,
            "{} --> {}",
            format_srt_timestamp(caption.start),
            format_srt_timestamp(caption.end),
        );
        output.push_str(&caption.text);
        output.push_str("\n\n");
    }

    output
}

/// Write captions as an SRT file.
pub fn write_srt(captions: &[Caption], path: &Path) -> ClipResult<()> {
    std::fs::write(path, generate_srt(captions))?;
    tracing::debug!(path = %path.display(), captions = captions.len(), "Wrote subtitle file");
    Ok(())
}
