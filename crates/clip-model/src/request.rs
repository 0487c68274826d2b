//! Render request and response shapes.
//!
//! The request is transport-agnostic: the CLI reads it from a JSON file, but
//! any caller that can produce this structure can drive a render.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use clipburn_common::config::{CaptionStrategy, FitMode};
use clipburn_common::error::{ClipError, ClipResult};

use crate::caption::{deserialize_seconds, Caption};
use crate::layout::RectOverrides;
use crate::style::{Rgba, StyleDescriptor, StylePatch};

/// A single clip render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Downloaded source video (must contain audio and video streams).
    pub source_video_path: PathBuf,

    /// Clip start, in seconds into the source video.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub start_offset: f64,

    /// Clip end, in seconds into the source video.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub end_offset: f64,

    /// Aspect-ratio tag (`9:16`, `16:9`, `1:1`, `4:5`, `2:3`).
    #[serde(default = "default_aspect_tag")]
    pub aspect_ratio: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub credit: String,

    /// Captions with absolute (source video) timestamps.
    #[serde(default)]
    pub captions: Vec<Caption>,

    #[serde(default)]
    pub styles: StyleOverrides,

    #[serde(default)]
    pub rects: RectOverrides,

    /// Overrides the configured fit mode.
    #[serde(default)]
    pub fit: Option<FitMode>,

    /// Overrides the configured background color.
    #[serde(default)]
    pub background: Option<Rgba>,

    /// Overrides the configured caption strategy.
    #[serde(default)]
    pub caption_strategy: Option<CaptionStrategy>,

    /// Output file; defaults to a name derived from the source in the output dir.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

/// Per-element style overrides, each applied over that element's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverrides {
    pub title: Option<StylePatch>,
    pub caption: Option<StylePatch>,
    pub credit: Option<StylePatch>,
}

/// Resolved styles for the three text elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyles {
    pub title: StyleDescriptor,
    pub caption: StyleDescriptor,
    pub credit: StyleDescriptor,
}

impl StyleOverrides {
    pub fn resolve(&self) -> ResolvedStyles {
        let merge = |patch: &Option<StylePatch>, base: StyleDescriptor| match patch {
            Some(patch) => patch.apply(base),
            None => base,
        };
        ResolvedStyles {
            title: merge(&self.title, StyleDescriptor::title_default()),
            caption: merge(&self.caption, StyleDescriptor::caption_default()),
            credit: merge(&self.credit, StyleDescriptor::credit_default()),
        }
    }
}

impl ResolvedStyles {
    /// Reject styles the rasterizer cannot draw.
    pub fn check(&self) -> ClipResult<()> {
        for (element, style) in [
            ("title", &self.title),
            ("caption", &self.caption),
            ("credit", &self.credit),
        ] {
            style
                .check()
                .map_err(|reason| ClipError::validation(format!("{element} style: {reason}")))?;
        }
        Ok(())
    }
}

fn default_aspect_tag() -> String {
    "9:16".to_string()
}

impl RenderRequest {
    /// Load a request from a JSON file.
    pub fn load(path: &Path) -> ClipResult<Self> {
        if !path.exists() {
            return Err(ClipError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Length of the rendered clip in seconds.
    pub fn clip_duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }

    /// Reject requests that cannot produce a render, before any work starts.
    pub fn validate(&self, min_clip_secs: f64) -> ClipResult<()> {
        if self.source_video_path.as_os_str().is_empty() {
            return Err(ClipError::validation("Source video path is empty"));
        }
        if !self.source_video_path.is_file() {
            return Err(ClipError::validation(format!(
                "Source video does not exist: {}",
                self.source_video_path.display()
            )));
        }
        if !self.start_offset.is_finite() || !self.end_offset.is_finite() {
            return Err(ClipError::validation("Clip offsets must be finite"));
        }
        if self.start_offset < 0.0 {
            return Err(ClipError::validation(format!(
                "Clip start must not be negative (got {})",
                self.start_offset
            )));
        }
        if self.end_offset <= self.start_offset {
            return Err(ClipError::validation(format!(
                "Clip end ({}) must be after clip start ({})",
                self.end_offset, self.start_offset
            )));
        }
        if self.clip_duration() < min_clip_secs {
            return Err(ClipError::validation(format!(
                "Clip is {:.3}s long, shorter than the {:.3}s minimum",
                self.clip_duration(),
                min_clip_secs
            )));
        }
        self.styles.resolve().check()
    }
}

/// Outcome of a render, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_video_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Engine output captured when the render engine failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl RenderResponse {
    pub fn ok(output: PathBuf) -> Self {
        Self {
            success: true,
            output_video_path: Some(output),
            error: None,
            diagnostics: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            output_video_path: None,
            error: Some(error.to_string()),
            diagnostics: None,
        }
    }

    /// Failure response carrying whatever diagnostics the error holds.
    pub fn from_error(err: &ClipError) -> Self {
        Self {
            diagnostics: err
                .diagnostics()
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string),
            ..Self::failed(err)
        }
    }
}

impl From<ClipResult<PathBuf>> for RenderResponse {
    fn from(result: ClipResult<PathBuf>) -> Self {
        match result {
            Ok(path) => RenderResponse::ok(path),
            Err(err) => RenderResponse::from_error(&err),
        }
    }
}
