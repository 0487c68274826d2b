//! Timed captions and clip-relative normalization.
//!
//! Captions arrive from the transcription service with absolute timestamps
//! (seconds into the source video). Before they reach the filter graph they
//! are sorted, shifted to clip-relative time, and clamped to the clip. The
//! normalized list is the single authority for caption order downstream.

use serde::{Deserialize, Deserializer, Serialize};

use clipburn_common::timecode::parse_timestamp;

/// A caption with a time window in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Start time in seconds.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub start: f64,
    /// End time in seconds.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub end: f64,
    /// Caption text.
    pub text: String,
}

impl Caption {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Duration of the visibility window.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Why a caption was dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Start or end is NaN or infinite.
    NonFinite,
    /// The window is empty or inverted after clamping the start.
    EmptyWindow,
    /// The caption starts at or after the end of the clip.
    PastClipEnd,
    /// No text remains after whitespace normalization.
    BlankText,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NonFinite => "non_finite",
            DropReason::EmptyWindow => "empty_window",
            DropReason::PastClipEnd => "past_clip_end",
            DropReason::BlankText => "blank_text",
        }
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert absolute captions into clip-relative, validated captions.
///
/// Steps, in order: stable sort by absolute start, subtract `start_offset`,
/// clamp start to zero, drop invalid captions, clamp end to `clip_duration`.
/// Every returned caption satisfies `0 <= start < end <= clip_duration`.
pub fn normalize_captions(raw: &[Caption], start_offset: f64, clip_duration: f64) -> Vec<Caption> {
    let mut sorted: Vec<&Caption> = raw.iter().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut normalized = Vec::with_capacity(sorted.len());
    let mut dropped = 0usize;

    for (index, caption) in sorted.into_iter().enumerate() {
        match normalize_one(caption, start_offset, clip_duration) {
            Ok(caption) => normalized.push(caption),
            Err(reason) => {
                dropped += 1;
                tracing::debug!(
                    index,
                    start = caption.start,
                    end = caption.end,
                    reason = reason.as_str(),
                    "Dropped caption"
                );
            }
        }
    }

    tracing::info!(
        received = raw.len(),
        kept = normalized.len(),
        dropped,
        start_offset,
        clip_duration,
        "Captions normalized"
    );

    normalized
}

fn normalize_one(
    caption: &Caption,
    start_offset: f64,
    clip_duration: f64,
) -> Result<Caption, DropReason> {
    if !caption.start.is_finite() || !caption.end.is_finite() {
        return Err(DropReason::NonFinite);
    }

    let start = (caption.start - start_offset).max(0.0);
    let end = caption.end - start_offset;

    if start >= end {
        return Err(DropReason::EmptyWindow);
    }
    if start >= clip_duration {
        return Err(DropReason::PastClipEnd);
    }

    let text = normalize_text(&caption.text);
    if text.is_empty() {
        return Err(DropReason::BlankText);
    }

    Ok(Caption {
        start,
        end: end.min(clip_duration),
        text,
    })
}

/// Deserialize seconds from either a JSON number or a clock string.
pub fn deserialize_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimeRepr {
        Number(f64),
        Text(String),
    }

    Ok(match TimeRepr::deserialize(deserializer)? {
        TimeRepr::Number(secs) => secs,
        TimeRepr::Text(text) => parse_timestamp(&text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shifts_to_clip_relative_time() {
        let raw = vec![Caption::new(12.605, 13.375, "hello there")];
        let out = normalize_captions(&raw, 12.0, 10.0);
        assert_eq!(out.len(), 1);
        assert!((out[0].start - 0.605).abs() < 1e-9);
        assert!((out[0].end - 1.375).abs() < 1e-9);
    }

    #[test]
    fn test_sorts_stably_by_absolute_start() {
        let raw = vec![
            Caption::new(5.0, 6.0, "third"),
            Caption::new(1.0, 2.0, "first"),
            Caption::new(3.0, 4.0, "second-a"),
            Caption::new(3.0, 4.5, "second-b"),
        ];
        let texts: Vec<String> = normalize_captions(&raw, 0.0, 10.0)
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second-a", "second-b", "third"]);
    }

    #[test]
    fn test_clamps_start_and_end() {
        let raw = vec![
            Caption::new(8.0, 11.0, "straddles start"),
            Caption::new(18.0, 25.0, "straddles end"),
        ];
        let out = normalize_captions(&raw, 10.0, 10.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start, 0.0);
        assert!((out[0].end - 1.0).abs() < 1e-9);
        assert!((out[1].start - 8.0).abs() < 1e-9);
        assert_eq!(out[1].end, 10.0);
    }

    #[test]
    fn test_drops_invalid_captions() {
        let raw = vec![
            Caption::new(1.0, 3.0, "before clip"),
            Caption::new(30.0, 31.0, "after clip"),
            Caption::new(12.0, 12.0, "zero length"),
            Caption::new(13.0, 12.5, "inverted"),
            Caption::new(14.0, 15.0, "   \n\t "),
            Caption::new(f64::NAN, 15.0, "nan"),
            Caption::new(16.0, 17.0, "  keep\n  me  "),
        ];
        let out = normalize_captions(&raw, 10.0, 10.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "keep me");
    }

    #[test]
    fn test_caption_accepts_clock_strings() {
        let caption: Caption = serde_json::from_str(
            r#"{ "start": "00:00:01,250", "end": 2.5, "text": "mixed" }"#,
        )
        .unwrap();
        assert!((caption.start - 1.25).abs() < 1e-9);
        assert!((caption.end - 2.5).abs() < 1e-9);
    }

    fn arb_caption() -> impl Strategy<Value = Caption> {
        (-50.0f64..200.0, -10.0f64..30.0, "[a-z ]{0,12}")
            .prop_map(|(start, len, text)| Caption::new(start, start + len, text))
    }

    proptest! {
        #[test]
        fn prop_normalized_captions_fit_clip(
            raw in proptest::collection::vec(arb_caption(), 0..40),
            start_offset in 0.0f64..100.0,
            clip_duration in 0.5f64..120.0,
        ) {
            let out = normalize_captions(&raw, start_offset, clip_duration);
            prop_assert!(out.len() <= raw.len());
            for caption in &out {
                prop_assert!(caption.start >= 0.0);
                prop_assert!(caption.start < caption.end);
                prop_assert!(caption.end <= clip_duration);
                prop_assert!(!caption.text.is_empty());
            }
            for pair in out.windows(2) {
                prop_assert!(pair[0].start <= pair[1].start);
            }
        }
    }
}
